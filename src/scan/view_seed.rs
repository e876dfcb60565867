//! View-closure maintenance (spec §3.3 "Invariant (view discipline)", §4.2).
//!
//! Called once by the normalizer to seed all four views, and again after
//! every scanner in the chain: any view a scanner left unset is rebuilt from
//! `raw` using the default transforms, so the view-closure invariant always
//! holds when the runner hands the value to the next stage.

use crate::confusables::default_table;
use crate::model::normalized::NormalizedInput;
use crate::model::views::TextViewSet;
use crate::scan::sanitize::hidden_ascii::reveal_tag_chars;
use crate::scan::sanitize::hidden_ascii::strip_tag_chars;
use crate::scan::sanitize::unicode::default_sanitize;
use crate::scan::surface::{physical_surfaces, view_set_mut};

/// Fill in any missing view on every surface `input.features` marks present.
#[must_use]
pub fn ensure_views(mut input: NormalizedInput) -> NormalizedInput {
    for surface in physical_surfaces(&input) {
        if let Some(vs) = view_set_mut(&mut input, surface) {
            ensure_view_set(vs);
        }
    }
    input
}

fn ensure_view_set(vs: &mut TextViewSet) {
    let (base_sanitized, _) = default_sanitize(&vs.raw);

    if vs.sanitized.is_none() {
        let (stripped, _) = strip_tag_chars(&base_sanitized);
        vs.sanitized = Some(stripped);
    }
    if vs.revealed.is_none() {
        let (revealed, _) = reveal_tag_chars(&base_sanitized);
        vs.revealed = Some(revealed);
    }
    if vs.skeleton.is_none() {
        let basis = vs.revealed.as_deref().unwrap_or(&base_sanitized);
        vs.skeleton = Some(default_table().skeletonize(basis));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuditRequest;
    use crate::normalize::normalize;

    #[test]
    fn seeds_all_four_views() {
        let req = AuditRequest::new("r1", 0, "hello\u{200B}world").with_response("done");
        let input = normalize(&req);
        let sealed = ensure_views(input);
        assert!(sealed.views.prompt.is_closed());
        assert!(sealed.views.response.unwrap().is_closed());
    }
}
