// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for name validation and unique-name generation

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pfs_core::collision::{split_name, validate_name, UniqueNames};
use pfs_core::EntryKind;

#[derive(Debug, Arbitrary)]
struct Input {
    name: String,
    folder: bool,
    take: u8,
}

fuzz_target!(|input: Input| {
    let kind = if input.folder { EntryKind::Directory } else { EntryKind::File };
    if validate_name(&input.name).is_err() {
        return;
    }

    let (stem, ext) = split_name(&input.name, kind);
    assert_eq!(format!("{stem}{ext}"), input.name);

    let mut seen = std::collections::HashSet::new();
    for candidate in UniqueNames::new(&input.name, kind).take(input.take as usize) {
        assert!(validate_name(&candidate).is_ok());
        assert_ne!(candidate, input.name);
        assert!(seen.insert(candidate));
    }
});
