//! Text rendering for `.pyt` toolboxes and their `.pyt.xml` metadata.

use crate::catalog::identity::alias_from_slug;
use crate::catalog::model::Toolbox;
use crate::generator::resolve::ResolvedTool;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const GENERATOR: &str = concat!("pytcatalog ", env!("CARGO_PKG_VERSION"));

/// `<output>.xml`, so `tools.pyt` pairs with `tools.pyt.xml`.
pub fn metadata_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".xml");
    output.with_file_name(name)
}

/// Render the toolbox module. Enabled tools form the `tools` list in order;
/// disabled ones only appear as comments.
pub fn render_pyt(toolbox: &Toolbox, tools: &[ResolvedTool], generated_at: DateTime<Utc>) -> String {
    let description = toolbox.description.as_deref().unwrap_or("");
    let mut out = String::new();

    out.push_str("# -*- coding: utf-8 -*-\n");
    out.push_str("\"\"\"\n");
    let _ = writeln!(out, "{}", docstring_text(&toolbox.name));
    out.push('\n');
    if !description.is_empty() {
        let _ = writeln!(out, "{}", docstring_text(description));
        out.push('\n');
    }
    let _ = writeln!(out, "Generated by {GENERATOR}");
    let _ = writeln!(out, "Generated: {}", generated_at.to_rfc3339());
    let _ = writeln!(out, "Toolbox ID: {}", toolbox.id);
    out.push_str("\"\"\"\n\n");

    if tools.is_empty() {
        out.push_str("# No tools\n");
    } else {
        out.push_str("# Tools, in toolbox order:\n");
        for tool in tools {
            let status = if tool.reference.enabled { "" } else { "disabled: " };
            let _ = writeln!(
                out,
                "# {status}{}: {} (source: {})",
                single_line(tool.display_name()),
                tool.module_path(),
                tool.reference.source_id
            );
        }
    }
    out.push('\n');

    let enabled: Vec<&ResolvedTool> = tools.iter().filter(|t| t.reference.enabled).collect();

    out.push_str("TOOL_MODULES = {\n");
    for tool in &enabled {
        let _ = writeln!(
            out,
            "    {}: {},",
            python_str(tool.display_name()),
            python_str(&tool.module_path())
        );
    }
    out.push_str("}\n\n\n");

    out.push_str("class Toolbox:\n");
    let _ = writeln!(
        out,
        "    \"\"\"Toolbox definition for {}.\"\"\"\n",
        docstring_text(&single_line(&toolbox.name))
    );
    out.push_str("    def __init__(self):\n");
    let _ = writeln!(out, "        self.label = {}", python_str(&toolbox.name));
    let _ = writeln!(
        out,
        "        self.alias = {}",
        python_str(&alias_from_slug(&toolbox.id))
    );
    let _ = writeln!(out, "        self.description = {}", python_str(description));
    if enabled.is_empty() {
        out.push_str("        self.tools = []\n");
    } else {
        out.push_str("        self.tools = [\n");
        for tool in &enabled {
            let _ = writeln!(out, "            {},", python_str(tool.display_name()));
        }
        out.push_str("        ]\n");
    }
    out.push('\n');
    out.push_str("    def get_tool(self, tool_name):\n");
    out.push_str("        \"\"\"Return the module path registered for a tool.\"\"\"\n");
    out.push_str("        return TOOL_MODULES.get(tool_name)\n");
    out
}

/// Render the ArcGIS metadata document that sits next to the toolbox.
pub fn render_metadata(
    toolbox: &Toolbox,
    tools: &[ResolvedTool],
    generated_at: DateTime<Utc>,
) -> String {
    let description = toolbox.description.as_deref().unwrap_or("");
    let alias = alias_from_slug(&toolbox.id);
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<metadata xml:lang=\"en\">\n");
    out.push_str("  <Esri>\n");
    let _ = writeln!(
        out,
        "    <CreaDate>{}</CreaDate>",
        generated_at.format("%Y%m%d")
    );
    let _ = writeln!(
        out,
        "    <CreaTime>{}00</CreaTime>",
        generated_at.format("%H%M%S")
    );
    out.push_str("    <ArcGISFormat>1.0</ArcGISFormat>\n");
    out.push_str("    <SyncOnce>TRUE</SyncOnce>\n");
    out.push_str("  </Esri>\n");
    let _ = writeln!(
        out,
        "  <toolbox name=\"{}\" alias=\"{}\">",
        xml_escape(&toolbox.name),
        xml_escape(&alias)
    );
    out.push_str("    <toolsets/>\n");
    for tool in tools.iter().filter(|t| t.reference.enabled) {
        let _ = writeln!(
            out,
            "    <tool name=\"{}\" displayname=\"{}\"/>",
            xml_escape(tool.tool_name()),
            xml_escape(tool.display_name())
        );
    }
    out.push_str("  </toolbox>\n");
    out.push_str("  <dataIdInfo>\n");
    out.push_str("    <idCitation>\n");
    let _ = writeln!(out, "      <resTitle>{}</resTitle>", xml_escape(&toolbox.name));
    out.push_str("    </idCitation>\n");
    let _ = writeln!(out, "    <idAbs>{}</idAbs>", xml_escape(description));
    let _ = writeln!(out, "    <idCredit>Generated by {GENERATOR}</idCredit>");
    out.push_str("  </dataIdInfo>\n");
    out.push_str("</metadata>\n");
    out
}

/// Double-quoted Python string literal.
pub fn python_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn docstring_text(value: &str) -> String {
    value.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::ToolReference;
    use crate::config::ToolConfig;
    use chrono::TimeZone;
    use serde_json::json;

    fn resolved(name: &str, path: &str, enabled: bool, alias: Option<&str>) -> ResolvedTool {
        let config = ToolConfig::from_value(json!({
            "tool": {"name": name, "label": name, "description": "d"},
            "implementation": {"executeFunction": format!("{name}.execute")},
            "parameters": []
        }))
        .unwrap();
        let mut reference = ToolReference::new("s1", path);
        reference.enabled = enabled;
        reference.alias = alias.map(str::to_string);
        ResolvedTool {
            reference,
            path: PathBuf::from("/src").join(path),
            config,
        }
    }

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn metadata_sits_beside_output() {
        assert_eq!(
            metadata_path(Path::new("/out/tb1.pyt")),
            PathBuf::from("/out/tb1.pyt.xml")
        );
    }

    #[test]
    fn pyt_lists_enabled_tools_in_order() {
        let mut toolbox = Toolbox::new("spatial-tools", "Spatial \"Tools\"", "tb.pyt");
        toolbox.description = Some("Buffers & clips".to_string());
        let tools = vec![
            resolved("clip", "tools/clip", true, None),
            resolved("buf", "tools/buf", false, None),
            resolved("dissolve", "more/dissolve", true, Some("Dissolve It")),
        ];
        let text = render_pyt(&toolbox, &tools, when());

        assert!(text.contains("self.label = \"Spatial \\\"Tools\\\"\""));
        assert!(text.contains("self.alias = \"spatialtools\""));
        assert!(text.contains("# clip: tools.clip (source: s1)"));
        assert!(text.contains("# disabled: buf: tools.buf (source: s1)"));
        assert!(text.contains("\"Dissolve It\": \"more.dissolve\","));
        let list_start = text.find("self.tools = [").unwrap();
        let list = &text[list_start..];
        let clip = list.find("\"clip\"").unwrap();
        let dissolve = list.find("\"Dissolve It\"").unwrap();
        assert!(clip < dissolve);
        assert!(!list.contains("\"buf\""));
        assert!(text.contains("Generated: 2024-03-09T14:05:07+00:00"));
    }

    #[test]
    fn empty_toolbox_renders_empty_list() {
        let toolbox = Toolbox::new("tb1", "Empty", "tb.pyt");
        let text = render_pyt(&toolbox, &[], when());
        assert!(text.contains("# No tools"));
        assert!(text.contains("self.tools = []"));
    }

    #[test]
    fn metadata_carries_date_and_escaped_fields() {
        let mut toolbox = Toolbox::new("tb1", "A & B", "tb.pyt");
        toolbox.description = Some("<desc>".to_string());
        let xml = render_metadata(&toolbox, &[resolved("buf", "tools/buf", true, None)], when());
        assert!(xml.contains("<CreaDate>20240309</CreaDate>"));
        assert!(xml.contains("<CreaTime>14050700</CreaTime>"));
        assert!(xml.contains("<toolbox name=\"A &amp; B\" alias=\"tb1\">"));
        assert!(xml.contains("<idAbs>&lt;desc&gt;</idAbs>"));
        assert!(xml.contains("<tool name=\"buf\" displayname=\"buf\"/>"));
    }

    #[test]
    fn python_strings_escape_quotes_and_newlines() {
        assert_eq!(python_str("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
    }
}
