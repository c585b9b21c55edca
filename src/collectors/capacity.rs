use crate::models::sample::Capacity;

/// Read total/used/free bytes for the filesystem holding `mount`.
///
/// This is the one probe whose failure fails the whole cycle: without the
/// used-bytes baseline there is no "other" bucket to compute.
pub fn read_capacity(mount: &str) -> Result<Capacity, nix::Error> {
    use nix::sys::statvfs::statvfs;
    let stat = statvfs(mount)?;

    let frsize = stat.fragment_size() as u64;
    let total_bytes = stat.blocks() as u64 * frsize;
    let free_bytes  = stat.blocks_free() as u64 * frsize;
    let used_bytes  = total_bytes.saturating_sub(free_bytes);

    Ok(Capacity { total_bytes, used_bytes, free_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_capacity() {
        let cap = read_capacity("/").unwrap();
        assert!(cap.total_bytes > 0);
        assert!(cap.used_bytes <= cap.total_bytes);
        assert_eq!(cap.used_bytes, cap.total_bytes - cap.free_bytes);
    }

    #[test]
    fn missing_mount_is_an_error() {
        assert!(read_capacity("/nonexistent_mount_xyz_12345").is_err());
    }
}
