const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn bytes_to_gb(bytes: f64) -> f64 {
    bytes / BYTES_PER_GB
}

/// Megabytes to bytes. Hikvision firmwares report disk sizes in MB.
pub fn mb_to_bytes(mb: f64) -> f64 {
    mb * 1024.0 * 1024.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
