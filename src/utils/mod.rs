//! Shared utility functions for lead-forge.
//!
//! This module provides common utilities used across multiple modules,
//! including structured-record extraction from generator output.

pub mod json_extraction;

pub use json_extraction::{
    analyze_json_structure, detect_truncated_json, extract_bracketed_sequence,
    extract_first_object, extract_outer_sequence, extract_records, find_matching_brace,
    find_matching_bracket, strip_code_fences, try_extract_records, ExtractionResult,
    JsonStructureAnalysis,
};
