//! Human and JSON views of directories.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::warn;

use super::ifd::TiffIfd;
use super::tag::Tag;
use super::tags::TagId;
use super::values::Value;

/// Elements shown before a preview is elided
const PREVIEW_ELEMENTS: usize = 8;

/// Description of one directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct TagSummary {
    /// Numeric tag id
    pub id: u16,

    /// Registered name, if the tag is known
    pub name: Option<&'static str>,

    /// Field type name (e.g. "SHORT")
    pub data_type: &'static str,

    pub count: u64,

    /// Shortened rendering of the value
    pub value: String,

    /// Whether the value has been edited or loaded
    pub in_memory: bool,
}

/// Description of one directory and its resolved children.
#[derive(Debug, Clone, Serialize)]
pub struct IfdSummary {
    /// Directory kind (e.g. "image", "exif")
    pub kind: &'static str,

    /// Offset in the source file; absent for built directories
    pub offset: Option<u64>,

    pub width: Option<u64>,
    pub height: Option<u64>,

    pub tags: Vec<TagSummary>,

    pub children: Vec<IfdSummary>,
}

impl TagSummary {
    pub fn from_tag(tag: &Tag) -> Self {
        let value = match tag.value() {
            Ok(value) => preview(&value),
            Err(e) => {
                warn!(tag = %tag.id(), error = %e, "Could not read tag value");
                format!("<unreadable: {e}>")
            }
        };
        Self {
            id: tag.id().as_u16(),
            name: tag.id().name(),
            data_type: tag.data_type().name(),
            count: tag.count(),
            value,
            in_memory: tag.is_in_memory(),
        }
    }
}

impl IfdSummary {
    pub fn from_ifd(ifd: &TiffIfd) -> Self {
        let dimension = |id| ifd.get(id).and_then(|tag| tag.as_u64().ok());
        Self {
            kind: ifd.kind().name(),
            offset: ifd.offset(),
            width: dimension(TagId::IMAGE_WIDTH),
            height: dimension(TagId::IMAGE_LENGTH),
            tags: ifd.tags().map(TagSummary::from_tag).collect(),
            children: ifd.children().map(IfdSummary::from_ifd).collect(),
        }
    }
}

/// Short rendering of a value for listings.
pub fn preview(value: &Value) -> String {
    if let Value::Ascii(_) = value {
        return format!("{:?}", value.as_str().unwrap_or_default());
    }
    if let Some(bytes) = value.as_bytes() {
        if bytes.len() > PREVIEW_ELEMENTS * 2 {
            return format!("<{} bytes>", bytes.len());
        }
    }

    let items: Vec<String> = match value {
        Value::Rational(pairs) => pairs.iter().map(|(n, d)| format!("{n}/{d}")).collect(),
        Value::SRational(pairs) => pairs.iter().map(|(n, d)| format!("{n}/{d}")).collect(),
        Value::Float(v) => v.iter().map(|x| x.to_string()).collect(),
        Value::Double(v) => v.iter().map(|x| x.to_string()).collect(),
        other => other
            .to_i64s()
            .map(|ints| ints.iter().map(|x| x.to_string()).collect())
            .or_else(|| other.to_u64s().map(|u| u.iter().map(|x| x.to_string()).collect()))
            .unwrap_or_default(),
    };

    let shown = items.len().min(PREVIEW_ELEMENTS);
    let mut out = items[..shown].join(", ");
    if items.len() > shown {
        let _ = write!(out, ", ... ({} total)", items.len());
    }
    out
}

/// Indented text listing of directories and their children.
pub fn render_text(summaries: &[IfdSummary]) -> String {
    fn render(out: &mut String, summary: &IfdSummary, label: &str, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}{label} ({})", summary.kind);
        if let Some(offset) = summary.offset {
            let _ = write!(out, " at offset {offset}");
        }
        if let (Some(w), Some(h)) = (summary.width, summary.height) {
            let _ = write!(out, ", {w}x{h}");
        }
        out.push('\n');

        for tag in &summary.tags {
            let name = tag.name.unwrap_or("Unknown");
            let _ = writeln!(
                out,
                "{indent}  {name} ({}) {}[{}] = {}",
                tag.id, tag.data_type, tag.count, tag.value
            );
        }
        for (i, child) in summary.children.iter().enumerate() {
            render(out, child, &format!("Sub-IFD {i}"), depth + 1);
        }
    }

    let mut out = String::new();
    for (i, summary) in summaries.iter().enumerate() {
        render(&mut out, summary, &format!("IFD {i}"), 0);
    }
    out
}
