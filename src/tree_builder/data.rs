// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Doctype validation and quirks-mode computation.

use tendril::StrTendril;

use crate::interface::QuirksMode::{self, LimitedQuirks, NoQuirks, Quirks};
use crate::tokenizer::Doctype;

// These should all be lowercase, for ASCII-case-insensitive matching.
static QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html 2.0 level 1//",
    "-//ietf//dtd html 2.0 level 2//",
    "-//ietf//dtd html 2.0 strict level 1//",
    "-//ietf//dtd html 2.0 strict level 2//",
    "-//ietf//dtd html 2.0 strict//",
    "-//ietf//dtd html 2.0//",
    "-//ietf//dtd html 2.1e//",
    "-//ietf//dtd html 3.0//",
    "-//ietf//dtd html 3.2 final//",
    "-//ietf//dtd html 3.2//",
    "-//ietf//dtd html 3//",
    "-//ietf//dtd html level 0//",
    "-//ietf//dtd html level 1//",
    "-//ietf//dtd html level 2//",
    "-//ietf//dtd html level 3//",
    "-//ietf//dtd html strict level 0//",
    "-//ietf//dtd html strict level 1//",
    "-//ietf//dtd html strict level 2//",
    "-//ietf//dtd html strict level 3//",
    "-//ietf//dtd html strict//",
    "-//ietf//dtd html//",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer 2.0 html strict//",
    "-//microsoft//dtd internet explorer 2.0 html//",
    "-//microsoft//dtd internet explorer 2.0 tables//",
    "-//microsoft//dtd internet explorer 3.0 html strict//",
    "-//microsoft//dtd internet explorer 3.0 html//",
    "-//microsoft//dtd internet explorer 3.0 tables//",
    "-//netscape comm. corp.//dtd html//",
    "-//netscape comm. corp.//dtd strict html//",
    "-//o'reilly and associates//dtd html 2.0//",
    "-//o'reilly and associates//dtd html extended 1.0//",
    "-//o'reilly and associates//dtd html extended relaxed 1.0//",
    "-//softquad software//dtd hotmetal pro 6.0::19990601::extensions to html 4.0//",
    "-//softquad//dtd hotmetal pro 4.0::19971010::extensions to html 4.0//",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//sun microsystems corp.//dtd hotjava html//",
    "-//sun microsystems corp.//dtd hotjava strict html//",
    "-//w3c//dtd html 3 1995-03-24//",
    "-//w3c//dtd html 3.2 draft//",
    "-//w3c//dtd html 3.2 final//",
    "-//w3c//dtd html 3.2//",
    "-//w3c//dtd html 3.2s draft//",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental 19960712//",
    "-//w3c//dtd html experimental 970421//",
    "-//w3c//dtd w3 html//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html 2.0//",
    "-//webtechs//dtd mozilla html//",
];

static QUIRKY_PUBLIC_MATCHES: &[&str] = &[
    "-//w3o//dtd w3 html strict 3.0//en//",
    "-/w3c/dtd html 4.0 transitional/en",
    "html",
];

static QUIRKY_SYSTEM_MATCHES: &[&str] =
    &["http://www.ibm.com/data/dtd/v11/ibmxhtml1-transitional.dtd"];

static LIMITED_QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "-//w3c//dtd xhtml 1.0 frameset//",
    "-//w3c//dtd xhtml 1.0 transitional//",
];

static HTML4_PUBLIC_PREFIXES: &[&str] = &[
    "-//w3c//dtd html 4.01 frameset//",
    "-//w3c//dtd html 4.01 transitional//",
];

fn opt_eq_ignore_case(value: &Option<StrTendril>, expected: &str) -> bool {
    match value {
        Some(value) => value.eq_ignore_ascii_case(expected),
        None => expected.is_empty(),
    }
}

fn contains_ignore_case(haystack: &[&str], needle: &StrTendril) -> bool {
    haystack.iter().any(|&x| needle.eq_ignore_ascii_case(x))
}

fn contains_prefix_ignore_case(haystack: &[&str], needle: &StrTendril) -> bool {
    haystack.iter().any(|&x| {
        needle.len() >= x.len() && needle.as_bytes()[..x.len()].eq_ignore_ascii_case(x.as_bytes())
    })
}

/// Is this doctype one of the "correct" ones, and what quirks mode does it
/// put the document in?
pub(crate) fn doctype_error_and_quirks(
    doctype: &Doctype,
    iframe_srcdoc: bool,
) -> (bool, QuirksMode) {
    fn is_doctype_ok(doctype: &Doctype) -> bool {
        let public = &doctype.public_id;
        let system = &doctype.system_id;

        let has_system_id = system.is_some();

        if !opt_eq_ignore_case(&doctype.name, "html") {
            false
        } else if public.is_none() {
            !has_system_id || opt_eq_ignore_case(system, "about:legacy-compat")
        } else if opt_eq_ignore_case(public, "-//W3C//DTD HTML 4.0//EN") {
            !has_system_id
                || opt_eq_ignore_case(system, "http://www.w3.org/TR/REC-html40/strict.dtd")
        } else if opt_eq_ignore_case(public, "-//W3C//DTD HTML 4.01//EN") {
            !has_system_id || opt_eq_ignore_case(system, "http://www.w3.org/TR/html4/strict.dtd")
        } else if opt_eq_ignore_case(public, "-//W3C//DTD XHTML 1.0 Strict//EN") {
            opt_eq_ignore_case(system, "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd")
        } else if opt_eq_ignore_case(public, "-//W3C//DTD XHTML 1.1//EN") {
            opt_eq_ignore_case(system, "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd")
        } else {
            false
        }
    }

    let err = !is_doctype_ok(doctype);

    // There aren't many strings here and this happens at most once per
    // parse, so linear scans are fine.
    let quirk = match (doctype.public_id.as_ref(), doctype.system_id.as_ref()) {
        _ if doctype.force_quirks => Quirks,
        _ if !opt_eq_ignore_case(&doctype.name, "html") => Quirks,

        _ if iframe_srcdoc => NoQuirks,

        (Some(p), _) if contains_ignore_case(QUIRKY_PUBLIC_MATCHES, p) => Quirks,
        (_, Some(s)) if contains_ignore_case(QUIRKY_SYSTEM_MATCHES, s) => Quirks,

        (Some(p), _) if contains_prefix_ignore_case(QUIRKY_PUBLIC_PREFIXES, p) => Quirks,
        (Some(p), _) if contains_prefix_ignore_case(LIMITED_QUIRKY_PUBLIC_PREFIXES, p) => {
            LimitedQuirks
        },

        (Some(p), s) if contains_prefix_ignore_case(HTML4_PUBLIC_PREFIXES, p) => match s {
            None => Quirks,
            Some(_) => LimitedQuirks,
        },

        _ => NoQuirks,
    };

    (err, quirk)
}

#[cfg(test)]
mod test {
    use super::doctype_error_and_quirks;
    use crate::interface::QuirksMode;
    use crate::tokenizer::Doctype;
    use tendril::SliceExt;

    fn doctype(name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Doctype {
        Doctype {
            name: Some(name.to_tendril()),
            public_id: public_id.map(|s| s.to_tendril()),
            system_id: system_id.map(|s| s.to_tendril()),
            force_quirks: false,
        }
    }

    #[test]
    fn modern_doctype_is_no_quirks() {
        let (err, quirks) = doctype_error_and_quirks(&doctype("html", None, None), false);
        assert!(!err);
        assert_eq!(quirks, QuirksMode::NoQuirks);
    }

    #[test]
    fn missing_name_forces_quirks() {
        let dt = Doctype::default();
        let (err, quirks) = doctype_error_and_quirks(&dt, false);
        assert!(err);
        assert_eq!(quirks, QuirksMode::Quirks);
    }

    #[test]
    fn html4_transitional_with_system_is_limited_quirks() {
        let dt = doctype(
            "html",
            Some("-//W3C//DTD HTML 4.01 Transitional//EN"),
            Some("http://www.w3.org/TR/html4/loose.dtd"),
        );
        let (err, quirks) = doctype_error_and_quirks(&dt, false);
        assert!(err);
        assert_eq!(quirks, QuirksMode::LimitedQuirks);
    }

    #[test]
    fn legacy_public_id_is_quirks() {
        let dt = doctype("html", Some("-//IETF//DTD HTML 2.0//EN"), None);
        assert_eq!(doctype_error_and_quirks(&dt, false).1, QuirksMode::Quirks);
    }
}
