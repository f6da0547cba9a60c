//! Symbol inspection fan-out and reply cleanup

use crate::services::SymbolInspector;
use indexmap::IndexMap;
use regex::Regex;

/// Sections dropped from inspection replies
const OMITTED_SECTIONS: [&str; 2] = ["Source", "Class docstring"];

/// Strips noise from inspection replies
///
/// Replies are split on red-highlighted headers (`ESC[1;31mHeader:ESC[0m`).
/// Text before the first header is discarded, the source listing and class
/// docstring sections are removed and the remaining headers are kept as plain
/// text. A reply with no highlighted headers is kept trimmed.
#[derive(Debug, Clone)]
pub struct InspectionFormatter {
    header: Regex,
}

impl InspectionFormatter {
    /// # Errors
    /// Only if the built-in header pattern fails to compile
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            header: Regex::new(r"\x1b\[1;31m([\w\s]+):\x1b\[0m")?,
        })
    }

    /// Cleaned description for one reply
    #[must_use]
    pub fn describe(&self, reply: &str) -> String {
        let headers: Vec<_> = self.header.captures_iter(reply).collect();
        if headers.is_empty() {
            return reply.trim().to_string();
        }

        let mut description = String::new();
        for (index, caps) in headers.iter().enumerate() {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let end = headers
                .get(index + 1)
                .and_then(|next| next.get(0))
                .map_or(reply.len(), |next| next.start());

            if OMITTED_SECTIONS.contains(&name.as_str()) {
                continue;
            }
            description.push_str(name.as_str());
            description.push(':');
            description.push_str(&reply[whole.end()..end]);
        }
        description
    }

    /// Inspect every symbol concurrently, keyed in symbol order
    ///
    /// A failed inspection yields an empty description.
    pub async fn inspect_all(
        &self,
        inspector: &dyn SymbolInspector,
        symbols: &[String],
    ) -> IndexMap<String, String> {
        let replies = futures::future::join_all(symbols.iter().map(|symbol| inspector.inspect(symbol.trim()))).await;

        symbols
            .iter()
            .zip(replies)
            .map(|(symbol, reply)| {
                let description = match reply {
                    Ok(text) => self.describe(&text),
                    Err(e) => {
                        tracing::debug!("Inspection of {} failed: {}", symbol, e);
                        String::new()
                    }
                };
                (symbol.clone(), description)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InspectionError;
    use pretty_assertions::assert_eq;

    fn red(header: &str) -> String {
        format!("\u{1b}[1;31m{header}:\u{1b}[0m")
    }

    #[test]
    fn drops_source_and_class_docstring() {
        let reply = format!(
            "{}      int\n{} 42\n{} def f(): pass\n{} Base docs\n{} Integer docs\n",
            red("Type"),
            red("String form"),
            red("Source"),
            red("Class docstring"),
            red("Docstring"),
        );
        let formatter = InspectionFormatter::new().unwrap();
        assert_eq!(
            formatter.describe(&reply),
            "Type:      int\nString form: 42\nDocstring: Integer docs\n"
        );
    }

    #[test]
    fn text_before_first_header_is_discarded() {
        let reply = format!("noise{} list", red("Type"));
        let formatter = InspectionFormatter::new().unwrap();
        assert_eq!(formatter.describe(&reply), "Type: list");
    }

    #[test]
    fn plain_reply_is_kept() {
        let formatter = InspectionFormatter::new().unwrap();
        assert_eq!(formatter.describe("  DataFrame with 3 rows \n"), "DataFrame with 3 rows");
    }

    struct Echo;

    #[async_trait::async_trait]
    impl SymbolInspector for Echo {
        async fn inspect(&self, symbol: &str) -> Result<String, InspectionError> {
            if symbol == "missing" {
                return Err(InspectionError::NotFound(symbol.to_string()));
            }
            Ok(format!("{} {symbol}", red("Type")))
        }
    }

    #[tokio::test]
    async fn fan_out_keeps_symbol_order_and_blanks_failures() {
        let formatter = InspectionFormatter::new().unwrap();
        let symbols = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let info = formatter.inspect_all(&Echo, &symbols).await;

        let keys: Vec<_> = info.keys().cloned().collect();
        assert_eq!(keys, symbols);
        assert_eq!(info["b"], "Type: b");
        assert_eq!(info["missing"], "");
    }
}
