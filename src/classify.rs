//! Reply classification and field extraction
//!
//! Pure text analysis of one inbound bot message: decides the semantic kind
//! (content, anti-spam throttle, nothing-found, malformed command) and, for
//! detail queries, strips the bot's boilerplate and pulls out structured
//! fields. Nothing here performs I/O; attachment references are recorded but
//! retrieval belongs to the dispatcher.

use crate::transport::{InboundMessage, MediaRef};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Caller-selected response-shape expectation
///
/// Detail queries get aggressive cleanup and field extraction; name-search
/// queries are long multi-record listings where cleanup would destroy data,
/// so they pass through nearly untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Detail,
    NameSearch,
}

/// Semantic kind of one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Content,
    RateLimited,
    NotFound,
    MalformedInput,
}

/// One classified reply, immutable once produced
#[derive(Debug, Clone)]
pub struct ClassifiedReply {
    /// Untouched message text as received
    pub raw_text: String,
    /// Cleaned text (residue after boilerplate stripping and field extraction)
    pub text: String,
    pub kind: ReplyKind,
    /// Extracted `field -> value` mapping; empty outside detail mode
    pub fields: BTreeMap<String, String>,
    /// Media carried by the originating message, if any
    pub attachment: Option<MediaRef>,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hard-coded pattern compiles")
}

// Terminal notices. Checked in order; first match wins.
static RATE_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)ANTI-?SPAM.*INTENTA\s+DESPU[EÉ]S"));
static NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\[[^\]]*⚠[^\]]*\]\s*(?:no se encontro información|no se encontró información|no se han encontrado resultados|no se encontró una|no hay resultados|no tenemos datos|no se encontraron registros)")
});
static MALFORMED: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)usa el formato correcto|formato incorrecto"));

// Detail-mode boilerplate: inline branding tags, header/footer lines,
// pagination markers and credit lines emitted around the actual record.
static INLINE_BRANDING: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\[#?LEDER_BOT\]|\[CONSULTA\s+PE\]|@lederdata\S*|-{3,}"));
static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*\[[^\]]*\]\s*→.*$"));
static FOOTER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)^\s*(?:Página\s*\d+\s*/\s*\d+.*|↞\s*Anterior.*|Siguiente\s*↠.*|Credits\s*:.*|Wanted\s+for\s*:.*|Marca\s+@\w+.*|Créditos\s*:\s*\d+.*)$")
});

// Name-search mode keeps everything except pure branding and pagination.
static LISTING_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)^\s*(?:\[[^\]]*LEDER[^\]]*\].*|Página\s*\d+\s*/\s*\d+.*|↞\s*Anterior.*|Siguiente\s*↠.*)$")
});
static RESULT_COUNT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)Se encontr[oó]\s+\d+\s+resultados?"));

// Fixed named-field patterns for the detail record format. Order matters:
// earlier patterns consume their span before later ones run on the residue.
static FIXED_FIELDS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("dni", re(r"(?i)\bDNI\s*:\s*(\d{8})")),
        ("ruc", re(r"(?i)\bRUC\s*:\s*(\d{11})")),
        (
            "apellido_paterno",
            re(r"(?i)APELLIDO\s+PATERNO\s*:\s*(.+)"),
        ),
        (
            "apellido_materno",
            re(r"(?i)APELLIDO\s+MATERNO\s*:\s*(.+)"),
        ),
        ("nombres", re(r"(?i)\bNOMBRES\s*:\s*(.+)")),
        ("estado", re(r"(?i)\bESTADO\s*:\s*(.+)")),
        (
            "fecha_nacimiento",
            re(r"(?i)(?:FECHA\s+DE\s+NACIMIENTO|F\.?\s*NAC\.?)\s*:\s*(.+)"),
        ),
        ("genero", re(r"(?i)(?:G[ÉE]NERO|SEXO)\s*:\s*(.+)")),
        (
            "direccion",
            re(r"(?i)(?:DIRECCI[ÓO]N|DOMICILIO)\s*:\s*(.+)"),
        ),
        ("ubigeo", re(r"(?i)\bUBIGEO\s*:\s*(.+)")),
        ("departamento", re(r"(?i)\bDEPARTAMENTO\s*:\s*(.+)")),
        ("provincia", re(r"(?i)\bPROVINCIA\s*:\s*(.+)")),
        ("distrito", re(r"(?i)\bDISTRITO\s*:\s*(.+)")),
        (
            "photo_type",
            re(r"(?i)\bFoto\s*:\s*(rostro|huella|firma|adverso|reverso)"),
        ),
    ]
});

// Generic `Label: value` fallback applied to whatever the fixed pass left.
static GENERIC_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*([A-Za-zÁÉÍÓÚÜÑáéíóúüñ][A-Za-z0-9ÁÉÍÓÚÜÑáéíóúüñ \t\./-]{0,48})\s*:\s*(\S.*)$")
});

/// Classify one inbound message for the given query mode
pub fn classify(message: &InboundMessage, mode: QueryMode) -> ClassifiedReply {
    let raw_text = message.text.clone();
    let kind = detect_kind(&raw_text);

    let (text, fields) = match (kind, mode) {
        // Terminal notices carry no extractable record
        (ReplyKind::RateLimited | ReplyKind::NotFound, _) => {
            (raw_text.trim().to_string(), BTreeMap::new())
        }
        (_, QueryMode::NameSearch) => (clean_listing(&raw_text), BTreeMap::new()),
        (_, QueryMode::Detail) => clean_and_extract(&raw_text),
    };

    ClassifiedReply {
        raw_text,
        text,
        kind,
        fields,
        attachment: message.media.clone(),
    }
}

fn detect_kind(raw_text: &str) -> ReplyKind {
    if RATE_LIMIT.is_match(raw_text) {
        ReplyKind::RateLimited
    } else if NOT_FOUND.is_match(raw_text) {
        ReplyKind::NotFound
    } else if MALFORMED.is_match(raw_text) {
        ReplyKind::MalformedInput
    } else {
        ReplyKind::Content
    }
}

/// Detail-mode cleanup: strip boilerplate, extract fixed fields, then run
/// the generic label parser on the residue. Returns the residual text and
/// the extracted mapping.
fn clean_and_extract(raw_text: &str) -> (String, BTreeMap<String, String>) {
    let mut fields = BTreeMap::new();
    let mut residual: Vec<String> = Vec::new();

    let stripped = INLINE_BRANDING.replace_all(raw_text, "");
    for line in stripped.lines() {
        if line.trim().is_empty()
            || HEADER_LINE.is_match(line)
            || FOOTER_LINE.is_match(line)
        {
            continue;
        }

        let leftover = extract_fixed_fields(line, &mut fields);
        let leftover = leftover.trim();
        if leftover.is_empty() {
            continue;
        }

        if let Some(caps) = GENERIC_LABEL.captures(leftover) {
            let label = snake_case_label(&caps[1]);
            let value = caps[2].trim().to_string();
            // The generic pass must never overwrite a fixed-pass field
            if !label.is_empty() && !value.is_empty() && !fields.contains_key(&label) {
                fields.insert(label, value);
                continue;
            }
        }
        residual.push(leftover.to_string());
    }

    (residual.join("\n"), fields)
}

/// Run every fixed pattern over one line, consuming matched spans
///
/// First writer wins per field: a pattern whose field is already populated
/// is skipped so repeated labels across messages keep their first value.
fn extract_fixed_fields(line: &str, fields: &mut BTreeMap<String, String>) -> String {
    let mut rest = line.to_string();
    for (name, pattern) in FIXED_FIELDS.iter() {
        if fields.contains_key(*name) {
            continue;
        }
        if let Some(caps) = pattern.captures(&rest) {
            if let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) {
                let value = value.as_str().trim().to_string();
                if !value.is_empty() {
                    fields.insert((*name).to_string(), value);
                }
                let range = whole.range();
                rest.replace_range(range, " ");
            }
        }
    }
    rest
}

/// Name-search cleanup: keep every data line, drop pure branding and
/// pagination, and reduce the premium header to its result-count sentence.
pub(crate) fn clean_listing(raw_text: &str) -> String {
    let mut lines = Vec::new();
    for line in raw_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains("RENIEC NOMBRES") && trimmed.contains("PREMIUM") {
            if let Some(count) = RESULT_COUNT.find(trimmed) {
                lines.push(format!("→ {}.", count.as_str()));
            }
            continue;
        }
        if LISTING_NOISE.is_match(trimmed) {
            continue;
        }
        lines.push(trimmed.to_string());
    }
    lines.join("\n")
}

/// Lower-case and snake-case a free-form label: `Estado Civil` -> `estado_civil`
fn snake_case_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_was_sep = true;
    for c in label.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
