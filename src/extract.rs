//! ID extraction: derive resource IDs from a request using its method, path
//! depth relative to the owning section, configured headers, and body queries.
//!
//! Body formats are pluggable behind `query`: JSON pointers via serde_json,
//! XML element paths via roxmltree. The request body is buffered by the
//! dispatcher before extraction, so reads here are non-destructive.

use crate::error::MockError;
use crate::pattern::split_path;
use crate::section::Section;
use axum::http::{HeaderMap, Method};

/// Derive the ordered, duplicate-free ID list for a request under `section`.
///
/// GET/HEAD/DELETE/PUT take the trailing path segment when the path is deeper
/// than the section pattern's literal segments (a resource-level request);
/// collection-level requests yield no IDs. POST/PATCH consult configured
/// headers, then body queries by content type, then fall back to the trailing
/// segment. A POST body that parses but yields nothing is `NoIdFound`.
pub fn extract_ids(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    section: &Section,
) -> Result<Vec<String>, MockError> {
    match method.as_str() {
        "GET" | "HEAD" | "DELETE" | "PUT" => {
            Ok(trailing_segment(path, section).into_iter().collect())
        }
        "POST" | "PATCH" => extract_for_write(method, path, headers, body, section),
        _ => Ok(Vec::new()),
    }
}

fn extract_for_write(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    section: &Section,
) -> Result<Vec<String>, MockError> {
    let mut ids: Vec<String> = Vec::new();

    for name in &section.header_id_names {
        if let Some(value) = headers.get(name.as_str())
            && let Ok(s) = value.to_str()
            && !s.is_empty()
        {
            push_unique(&mut ids, s.to_string());
        }
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let queried = if content_type.starts_with("application/json") {
        query_json_body(body, &section.body_id_paths, &mut ids)?;
        true
    } else if content_type.starts_with("application/xml") || content_type.starts_with("text/xml") {
        query_xml_body(body, &section.body_id_paths, &mut ids)?;
        true
    } else {
        false
    };

    if ids.is_empty()
        && let Some(tail) = trailing_segment(path, section)
    {
        push_unique(&mut ids, tail);
    }

    if ids.is_empty() && queried && *method == Method::POST {
        return Err(MockError::NoIdFound);
    }
    Ok(ids)
}

/// The trailing path segment, when the path is deeper than the section
/// pattern's literal segments. Collection-level paths return None.
fn trailing_segment(path: &str, section: &Section) -> Option<String> {
    let parts = split_path(path);
    if parts.len() > section.pattern.literal_len() {
        parts.last().map(|s| s.to_string())
    } else {
        None
    }
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !id.is_empty() && !ids.contains(&id) {
        ids.push(id);
    }
}

fn query_json_body(
    body: &[u8],
    exprs: &[String],
    ids: &mut Vec<String>,
) -> Result<(), MockError> {
    if body.is_empty() {
        return Ok(());
    }
    let doc: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| MockError::BadRequest(format!("invalid JSON body: {e}")))?;
    for expr in exprs {
        for value in query_json(&doc, expr) {
            push_unique(ids, value);
        }
    }
    Ok(())
}

/// Evaluate a JSON pointer. A pointer resolving to a scalar yields it; an
/// array yields its scalar elements. When the document root is an array, the
/// pointer is applied to each element.
pub fn query_json(doc: &serde_json::Value, expr: &str) -> Vec<String> {
    let mut out = Vec::new();
    match doc.pointer(expr) {
        Some(v) => collect_scalars(v, &mut out),
        None => {
            if let Some(items) = doc.as_array() {
                for item in items {
                    if let Some(v) = item.pointer(expr) {
                        collect_scalars(v, &mut out);
                    }
                }
            }
        }
    }
    out
}

fn collect_scalars(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Bool(b) => out.push(b.to_string()),
        serde_json::Value::Array(items) => {
            for item in items {
                if !item.is_array() && !item.is_object() {
                    collect_scalars(item, out);
                }
            }
        }
        _ => {}
    }
}

fn query_xml_body(body: &[u8], exprs: &[String], ids: &mut Vec<String>) -> Result<(), MockError> {
    if body.is_empty() {
        return Ok(());
    }
    let text = std::str::from_utf8(body)
        .map_err(|e| MockError::BadRequest(format!("XML body is not UTF-8: {e}")))?;
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| MockError::BadRequest(format!("invalid XML body: {e}")))?;
    for expr in exprs {
        for value in query_xml(&doc, expr) {
            push_unique(ids, value);
        }
    }
    Ok(())
}

/// Evaluate an absolute element path (`/user/id`) against an XML document,
/// returning the trimmed text of every matching element.
pub fn query_xml(doc: &roxmltree::Document<'_>, expr: &str) -> Vec<String> {
    let segs: Vec<&str> = expr.split('/').filter(|s| !s.is_empty()).collect();
    if segs.is_empty() {
        return Vec::new();
    }
    let mut nodes: Vec<roxmltree::Node<'_, '_>> = vec![doc.root()];
    for seg in &segs {
        nodes = nodes
            .iter()
            .flat_map(|n| n.children())
            .filter(|c| c.is_element() && c.has_tag_name(*seg))
            .collect();
        if nodes.is_empty() {
            return Vec::new();
        }
    }
    nodes
        .iter()
        .filter_map(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
