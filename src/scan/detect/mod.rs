//! Detector scanners (spec §4.5–§4.7, SPEC_FULL.md §11): the rule-pack
//! regex engine, the cheaper keyword-injection literal scanner, tool-call
//! SSRF/path-traversal checks, and the narrow contradiction heuristic.

pub mod contradiction;
pub mod keyword;
pub mod rulepack_scanner;
pub mod tool_boundary;

pub use contradiction::ContradictionDetector;
pub use keyword::KeywordInjectionScanner;
pub use rulepack_scanner::RulePackScanner;
pub use tool_boundary::{PathTraversalDetector, SsrfDetector};
