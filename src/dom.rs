//! HTML documents behind a small trait seam, with a scraper implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomError {
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("could not load document: {0}")]
    Load(String),
}

/// A node of a loaded document.
pub trait Element {
    /// Descendants matching a CSS selector, in document order.
    fn select<'s>(&'s self, selector: &str) -> Result<Vec<Box<dyn Element + 's>>, DomError>;

    /// Concatenated, trimmed text of the node and its descendants.
    fn text(&self) -> String;

    fn inner_html(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;
}

pub trait Document: Send {
    fn load(&mut self, html: &str) -> Result<(), DomError>;

    fn root(&self) -> Box<dyn Element + '_>;

    /// Elements of the whole document matching a CSS selector.
    fn select(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>, DomError>;
}

pub trait DomFactory: Send + Sync {
    fn create(&self) -> Box<dyn Document>;

    /// Checks a selector without a document, so bad selectors fail before
    /// anything is fetched.
    fn validate_selector(&self, selector: &str) -> Result<(), DomError>;
}

/// Creates an empty document and loads `html` into it.
pub fn load_document(factory: &dyn DomFactory, html: &str) -> Result<Box<dyn Document>, DomError> {
    let mut document = factory.create();
    document.load(html)?;
    Ok(document)
}

/// Parsed selectors by source text.
#[derive(Debug, Default)]
struct SelectorCache {
    parsed: Mutex<HashMap<String, Arc<Selector>>>,
}

impl SelectorCache {
    fn get(&self, selector: &str) -> Result<Arc<Selector>, DomError> {
        let mut parsed = self.parsed.lock();
        if let Some(found) = parsed.get(selector) {
            return Ok(Arc::clone(found));
        }
        let compiled = Arc::new(parse_selector(selector)?);
        parsed.insert(selector.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// Scraper-backed documents.
///
/// Every selector is parsed once per factory: validation fills the cache
/// and the documents it creates read from it.
#[derive(Debug, Clone, Default)]
pub struct ScraperDomFactory {
    selectors: Arc<SelectorCache>,
}

impl ScraperDomFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomFactory for ScraperDomFactory {
    fn create(&self) -> Box<dyn Document> {
        Box::new(ScraperDocument {
            html: Html::new_document(),
            selectors: Arc::clone(&self.selectors),
        })
    }

    fn validate_selector(&self, selector: &str) -> Result<(), DomError> {
        self.selectors.get(selector).map(|_| ())
    }
}

pub struct ScraperDocument {
    html: Html,
    selectors: Arc<SelectorCache>,
}

impl Document for ScraperDocument {
    fn load(&mut self, html: &str) -> Result<(), DomError> {
        self.html = Html::parse_document(html);
        Ok(())
    }

    fn root(&self) -> Box<dyn Element + '_> {
        Box::new(ScraperElement {
            node: self.html.root_element(),
            selectors: &self.selectors,
        })
    }

    fn select(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>, DomError> {
        let parsed = self.selectors.get(selector)?;
        let found = self
            .html
            .select(&parsed)
            .map(|node| {
                Box::new(ScraperElement {
                    node,
                    selectors: &self.selectors,
                }) as Box<dyn Element + '_>
            })
            .collect();
        Ok(found)
    }
}

struct ScraperElement<'a> {
    node: ElementRef<'a>,
    selectors: &'a SelectorCache,
}

impl Element for ScraperElement<'_> {
    fn select<'s>(&'s self, selector: &str) -> Result<Vec<Box<dyn Element + 's>>, DomError> {
        let parsed = self.selectors.get(selector)?;
        let found = self
            .node
            .select(&parsed)
            .map(|node| {
                Box::new(ScraperElement {
                    node,
                    selectors: self.selectors,
                }) as Box<dyn Element + 's>
            })
            .collect();
        Ok(found)
    }

    fn text(&self) -> String {
        self.node.text().collect::<String>().trim().to_string()
    }

    fn inner_html(&self) -> String {
        self.node.inner_html()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.node.value().attr(name).map(str::to_string)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|e| DomError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<div><a href="http://google.com">link</a><span class="address">4332 Forest Hill Blvd<br>West Palm Beach</span></div>"#;

    #[test]
    fn test_select_text_and_attribute() {
        let doc = load_document(&ScraperDomFactory::new(), PAGE).unwrap();
        let root = doc.root();

        let links = root.select("a").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text(), "link");
        assert_eq!(links[0].attribute("href").as_deref(), Some("http://google.com"));
        assert_eq!(links[0].attribute("title"), None);

        let address = root.select(".address").unwrap();
        assert_eq!(address[0].inner_html(), "4332 Forest Hill Blvd<br>West Palm Beach");
    }

    #[test]
    fn test_bad_selector() {
        let err = ScraperDomFactory::new().validate_selector("div[").unwrap_err();
        assert!(matches!(err, DomError::Selector { .. }));
    }

    #[test]
    fn test_selectors_are_parsed_once() {
        let factory = ScraperDomFactory::new();
        factory.validate_selector("a").unwrap();
        let doc = load_document(&factory, PAGE).unwrap();

        for _ in 0..3 {
            assert_eq!(doc.select("a").unwrap().len(), 1);
            let root = doc.root();
            assert_eq!(root.select("a").unwrap()[0].select("a").unwrap().len(), 0);
        }
        assert_eq!(factory.selectors.parsed.lock().len(), 1);

        let first = factory.selectors.get("a").unwrap();
        let again = factory.selectors.get("a").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
}
