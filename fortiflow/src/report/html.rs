//! Self-contained HTML output with collapsible flow sections.

use std::fmt::Write;

use super::document::ReportDocument;

const HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
.collapsible {
  background-color: #777;
  color: white;
  cursor: pointer;
  padding: 18px;
  width: 100%;
  border: none;
  text-align: left;
  outline: none;
  font-size: 15px;
}
.active, .collapsible:hover {
  background-color: #555;
}
.collapsible.unavailable {
  background-color: #a94442;
}
.content {
  padding: 0 18px;
  display: none;
  overflow: hidden;
  background-color: #f1f1f1;
  font-family: monospace;
}
</style>
"#;

const TAIL: &str = r#"<script>
var coll = document.getElementsByClassName("collapsible");
for (var i = 0; i < coll.length; i++) {
  coll[i].addEventListener("click", function() {
    this.classList.toggle("active");
    var content = this.nextElementSibling;
    content.style.display = content.style.display === "block" ? "none" : "block";
  });
}
</script>
</body>
</html>
"#;

/// Escape text for element content and double-quoted attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl ReportDocument {
    /// Render as a single HTML page. The page works without any external
    /// stylesheet or script.
    pub fn to_html(&self) -> String {
        let mut html = String::from(HEAD);
        // Writing into a String cannot fail
        let _ = writeln!(html, "<title>{}</title>\n</head>\n<body>", escape(&self.title));
        let _ = writeln!(html, "<h2>{}</h2>", escape(&self.title));
        let _ = writeln!(html, "<h3>Host: {}</h3>", escape(&self.meta.host));
        let _ = writeln!(html, "<h3>Filter type: {}</h3>", escape(&self.meta.filter_type));
        let _ = writeln!(html, "<h3>Filter Option 1: {}</h3>", escape(&self.meta.option1));
        let _ = writeln!(html, "<h3>Filter Option 2: {}</h3>", escape(&self.meta.option2));

        for section in &self.sections {
            let class = if section.header.is_available() {
                "collapsible"
            } else {
                "collapsible unavailable"
            };
            let _ = writeln!(
                html,
                "<button type=\"button\" class=\"{}\" data-trace-id=\"{}\">{}</button>",
                class,
                escape(&section.trace_id),
                escape(&section.label)
            );
            html.push_str("<div class=\"content\">\n");
            for line in &section.lines {
                let _ = writeln!(html, "<p>{}</p>", escape(line));
            }
            html.push_str("</div>\n");
        }

        html.push_str(TAIL);
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterKind, FilterSpec};
    use crate::report::{SessionMeta, render};
    use crate::trace::correlate;

    fn doc(raw: &str) -> ReportDocument {
        let filter = FilterSpec::build(FilterKind::PortDst, "80", Some("443")).unwrap();
        render(&correlate(raw), &SessionMeta::new("192.0.2.1", &filter))
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_title_block() {
        let html = doc("").to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h3>Host: 192.0.2.1</h3>"));
        assert!(html.contains("<h3>Filter type: dport</h3>"));
        assert!(html.contains("<h3>Filter Option 1: 80</h3>"));
        assert!(html.contains("<h3>Filter Option 2: 443</h3>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_sections_and_lines() {
        let raw = "2024-03-01 10:15:02 id=1 trace_id=8 msg=\"received a packet(proto=6, 10.0.0.5:1->10.0.0.6:80)\"\n\
                   2024-03-01 10:15:02 id=2 trace_id=8 msg=\"allowed by policy-1\"\n\
                   id=3 trace_id=9 msg=\"<odd>\"\n";
        let html = doc(raw).to_html();

        assert_eq!(html.matches("<button").count(), 2);
        assert!(html.contains(
            ">2024-03-01 10:15:02 Src: 10.0.0.5:1 --&gt;&gt; Dst: 10.0.0.6:80</button>"
        ));
        assert!(html.contains("class=\"collapsible unavailable\" data-trace-id=\"9\""));
        assert!(html.contains("<p>id=3 trace_id=9 msg=&quot;&lt;odd&gt;&quot;</p>"));

        let first = html.find("allowed by policy-1").unwrap();
        let packet = html.find("received a packet").unwrap();
        let button_8 = html.find("data-trace-id=\"8\"").unwrap();
        assert!(button_8 < packet && packet < first);
    }
}
