// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Build a [`SmallCharSet`](crate::SmallCharSet) from character literals.
///
/// Every member must be an ASCII character.
macro_rules! small_char_set ( ($($e:expr)+) => (
    $crate::util::smallcharset::SmallCharSet {
        bits: $( (1u128 << ($e as u32)) )|+
    }
));

macro_rules! time {
    ($e:expr) => {{
        let now = ::std::time::Instant::now();
        let result = $e;
        let d = now.elapsed();
        let dt = d.as_secs() * 1_000_000_000 + u64::from(d.subsec_nanos());
        (result, dt)
    }};
}
