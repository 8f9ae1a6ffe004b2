// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let out_dir = env::var("OUT_DIR").unwrap();

    let entities = Path::new(&manifest_dir).join("data").join("entities.json");
    named_entities_to_phf(&entities, &Path::new(&out_dir).join("named_entities.rs"));

    println!("cargo:rerun-if-changed={}", entities.display());
}

/// An entry in entities.json.
#[derive(Deserialize)]
struct CharRef {
    codepoints: Vec<u32>,
    // `characters` is also present in the file but the codepoints suffice.
}

fn named_entities_to_phf(from: &Path, to: &Path) {
    let entities: HashMap<String, CharRef> =
        serde_json::from_reader(File::open(from).unwrap()).unwrap();

    let mut entities: HashMap<String, (u32, u32)> = entities
        .into_iter()
        .map(|(name, char_ref)| {
            assert!(name.starts_with('&'));
            assert!(char_ref.codepoints.len() <= 2);
            (
                name[1..].to_owned(),
                (
                    char_ref.codepoints[0],
                    char_ref.codepoints.get(1).copied().unwrap_or(0),
                ),
            )
        })
        .collect();

    // Add every missing prefix of those keys, mapping to NUL characters,
    // so that the matcher can distinguish "dead end" from "keep going".
    for key in entities.keys().cloned().collect::<Vec<_>>() {
        for n in 1..key.len() {
            let prefix = &key[..n];
            if !entities.contains_key(prefix) {
                entities.insert(prefix.to_owned(), (0, 0));
            }
        }
    }
    entities.insert(String::new(), (0, 0));

    let mut phf_map = phf_codegen::Map::new();
    for (key, &value) in &entities {
        phf_map.entry(key.as_str(), &format!("{value:?}"));
    }

    let mut file = BufWriter::new(File::create(to).unwrap());
    writeln!(
        &mut file,
        "/// A map of entity names (with the leading `&` removed) to their\n\
         /// codepoints. The second codepoint is 0 for single-codepoint\n\
         /// entities. Proper prefixes of entity names map to `(0, 0)`.\n\
         pub static NAMED_ENTITIES: ::phf::Map<&'static str, (u32, u32)> = {};",
        phf_map.build()
    )
    .unwrap();
}
