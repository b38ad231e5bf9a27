// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for VirtualPath parsing and normalization

#![no_main]

use libfuzzer_sys::fuzz_target;
use pfs_core::path::VirtualPath;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Some(parsed) = VirtualPath::parse_uri(input) {
            assert_eq!(VirtualPath::parse_uri(&parsed.to_uri()), Some(parsed));
        }

        if let Some((backend, path)) = input.split_once('/') {
            let vpath = VirtualPath::new(backend, path);

            // normalized paths never keep dot segments
            assert!(vpath.segments.iter().all(|s| !s.is_empty() && s != "." && s != ".."));
            assert_eq!(VirtualPath::new(backend, vpath.to_path_string()), vpath);

            if let Some(parent) = vpath.parent() {
                assert!(vpath.starts_with(&parent));
            }
            if let Some(name) = vpath.name() {
                assert_eq!(vpath.with_name(name), vpath);
            }
        }
    }
});
