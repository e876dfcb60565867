//! Enumeration of the textual surfaces an audit carries, used by every
//! scanner that needs to walk "the prompt, each chunk, and the response" in
//! the order spec §4.5 describes.

use crate::model::finding::Target;
use crate::model::normalized::NormalizedInput;
use crate::model::views::{Source, TextViewSet, View};

/// One textual surface under audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// The top-level user prompt.
    Prompt,
    /// A chunk as it appears in `canonical.prompt_chunks_canonical`, which
    /// includes the user prompt itself at index 0 (spec §4.1(b)). Chunk 0 is
    /// backed by `views.prompt` (the same storage as [`Surface::Prompt`]);
    /// every other chunk is backed by `views.chunks[canonical_index - 1]`.
    Chunk {
        /// Chunk source kind.
        source: Source,
        /// Stable index as it appears in `promptChunksCanonical`.
        canonical_index: usize,
    },
    /// The model's response.
    Response,
}

impl Surface {
    /// Build a [`Target`] for this surface at the given view.
    #[must_use]
    pub fn target(&self, view: View) -> Target {
        match self {
            Surface::Prompt => Target::prompt(view),
            Surface::Chunk { source, canonical_index } => Target::chunk(view, *source, *canonical_index),
            Surface::Response => Target::response(view),
        }
    }
}

/// All surfaces present in `input`, in target-iteration order: prompt,
/// chunks by index (including chunk 0, the user prompt as a `promptChunk`
/// with `source = user` — spec §4.1(b), §3.5), response (spec §4.5
/// "Tie-breaks").
///
/// Chunk 0 and [`Surface::Prompt`] share the same underlying text
/// (`views.prompt`); both are enumerated so a rule scoped to either `prompt`
/// or `promptChunk`/`user` can match it. Detectors that evaluate a single
/// rule against every surface (e.g. [`crate::scan::detect::rulepack_scanner`])
/// are responsible for deduplicating per-rule findings that hit both.
#[must_use]
pub fn surfaces(input: &NormalizedInput) -> Vec<Surface> {
    let mut out = vec![Surface::Prompt];
    for chunk in &input.canonical.prompt_chunks_canonical {
        out.push(Surface::Chunk {
            source: chunk.source,
            canonical_index: chunk.chunk_index,
        });
    }
    if input.features.has_response {
        out.push(Surface::Response);
    }
    out
}

/// Surfaces backed by distinct physical storage: [`Surface::Prompt`], then
/// each non-prompt chunk (`canonical_index >= 1`), then the response.
///
/// Unlike [`surfaces`], this omits the chunk-0 `promptChunk`/`user` alias,
/// since it shares `views.prompt` with [`Surface::Prompt`]. Scanners that
/// mutate views or emit one finding per touched view-set (sanitizers, the
/// skeleton enricher, the view-closure seeder, the keyword detector) use
/// this so they don't double-process — and double-report — the same text.
#[must_use]
pub fn physical_surfaces(input: &NormalizedInput) -> Vec<Surface> {
    let mut out = vec![Surface::Prompt];
    for chunk in input.canonical.prompt_chunks_canonical.iter().skip(1) {
        out.push(Surface::Chunk {
            source: chunk.source,
            canonical_index: chunk.chunk_index,
        });
    }
    if input.features.has_response {
        out.push(Surface::Response);
    }
    out
}

/// Borrow the [`TextViewSet`] for a surface.
#[must_use]
pub fn view_set<'a>(input: &'a NormalizedInput, surface: Surface) -> Option<&'a TextViewSet> {
    match surface {
        Surface::Prompt | Surface::Chunk { canonical_index: 0, .. } => Some(&input.views.prompt),
        Surface::Chunk { canonical_index, .. } => input.views.chunks.get(canonical_index - 1),
        Surface::Response => input.views.response.as_ref(),
    }
}

/// Mutably borrow the [`TextViewSet`] for a surface.
pub fn view_set_mut<'a>(input: &'a mut NormalizedInput, surface: Surface) -> Option<&'a mut TextViewSet> {
    match surface {
        Surface::Prompt | Surface::Chunk { canonical_index: 0, .. } => Some(&mut input.views.prompt),
        Surface::Chunk { canonical_index, .. } => input.views.chunks.get_mut(canonical_index - 1),
        Surface::Response => input.views.response.as_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuditRequest;
    use crate::normalize::normalize;

    #[test]
    fn surfaces_includes_chunk_zero_as_user_prompt_chunk() {
        let input = normalize(&AuditRequest::new("r1", 0, "hi there"));
        let surfaces = surfaces(&input);
        assert!(matches!(surfaces[0], Surface::Prompt));
        assert!(surfaces.iter().any(|s| matches!(
            s,
            Surface::Chunk {
                source: Source::User,
                canonical_index: 0
            }
        )));
    }

    #[test]
    fn chunk_zero_reads_from_the_prompt_view_set() {
        let input = normalize(&AuditRequest::new("r1", 0, "hi there"));
        let chunk_zero = Surface::Chunk {
            source: Source::User,
            canonical_index: 0,
        };
        assert_eq!(view_set(&input, chunk_zero).unwrap().raw, input.views.prompt.raw);
    }

    #[test]
    fn physical_surfaces_omits_the_chunk_zero_alias() {
        let input = normalize(
            &AuditRequest::new("r1", 0, "hi there")
                .with_retrieval_doc(crate::model::request::RetrievalDoc::new("doc text")),
        );
        let physical = physical_surfaces(&input);
        assert!(!physical
            .iter()
            .any(|s| matches!(s, Surface::Chunk { canonical_index: 0, .. })));
        // One fewer than `surfaces()`, which also carries the chunk-0 alias.
        assert_eq!(physical.len() + 1, surfaces(&input).len());
    }
}
