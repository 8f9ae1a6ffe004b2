// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Static data for character references.

/// The replacement characters for the C1 control range 0x80–0x9F in numeric
/// character references, per the HTML Standard's Windows-1252 table.
/// `None` means the codepoint is kept as-is (still a parse error).
pub static C1_REPLACEMENTS: [Option<char>; 32] = [
    Some('\u{20ac}'), // 0x80 €
    None,             // 0x81
    Some('\u{201a}'), // 0x82 ‚
    Some('\u{0192}'), // 0x83 ƒ
    Some('\u{201e}'), // 0x84 „
    Some('\u{2026}'), // 0x85 …
    Some('\u{2020}'), // 0x86 †
    Some('\u{2021}'), // 0x87 ‡
    Some('\u{02c6}'), // 0x88 ˆ
    Some('\u{2030}'), // 0x89 ‰
    Some('\u{0160}'), // 0x8A Š
    Some('\u{2039}'), // 0x8B ‹
    Some('\u{0152}'), // 0x8C Œ
    None,             // 0x8D
    Some('\u{017d}'), // 0x8E Ž
    None,             // 0x8F
    None,             // 0x90
    Some('\u{2018}'), // 0x91 '
    Some('\u{2019}'), // 0x92 '
    Some('\u{201c}'), // 0x93 "
    Some('\u{201d}'), // 0x94 "
    Some('\u{2022}'), // 0x95 •
    Some('\u{2013}'), // 0x96 –
    Some('\u{2014}'), // 0x97 —
    Some('\u{02dc}'), // 0x98 ˜
    Some('\u{2122}'), // 0x99 ™
    Some('\u{0161}'), // 0x9A š
    Some('\u{203a}'), // 0x9B ›
    Some('\u{0153}'), // 0x9C œ
    None,             // 0x9D
    Some('\u{017e}'), // 0x9E ž
    Some('\u{0178}'), // 0x9F Ÿ
];

include!(concat!(env!("OUT_DIR"), "/named_entities.rs"));

#[cfg(test)]
mod test {
    use super::NAMED_ENTITIES;

    #[test]
    fn entity_map_has_full_matches_and_prefixes() {
        assert_eq!(NAMED_ENTITIES.get("gt;").unwrap(), &(62, 0));
        assert_eq!(NAMED_ENTITIES.get("copy").unwrap(), &(169, 0));
        // A prefix that is not itself an entity maps to (0, 0).
        assert_eq!(NAMED_ENTITIES.get("cop").unwrap(), &(0, 0));
        // Two-codepoint entity.
        assert_eq!(NAMED_ENTITIES.get("NotEqualTilde;").unwrap(), &(0x2242, 0x338));
    }
}
