/*
 * Provides SHA-256 checksums of document content. The editing session keeps
 * the checksum of every file as it was last saved or loaded, which lets it
 * report which records actually changed without holding a second copy of the
 * whole bundle.
 */
use crate::core::models::FileRecord;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/* Hex-encoded SHA-256 of the UTF-8 bytes of `content`. */
pub fn content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/*
 * Computes the checksum of every record, keyed by path.
 */
pub fn checksum_map(records: &[FileRecord]) -> HashMap<String, String> {
    let map: HashMap<String, String> = records
        .iter()
        .map(|r| (r.path.clone(), content_checksum(&r.content)))
        .collect();
    log::trace!("ChecksumUtils: Computed checksums for {} records", map.len());
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_checksum_known_values() {
        assert_eq!(
            content_checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            content_checksum("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksum_map_keys_by_path() {
        let records = vec![FileRecord::new("/a.ftl", "abc"), FileRecord::new("/b.ftl", "")];
        let map = checksum_map(&records);
        assert_eq!(map.len(), 2);
        assert_eq!(map["/a.ftl"], content_checksum("abc"));
        assert_ne!(map["/a.ftl"], map["/b.ftl"]);
    }
}
