//! Registry public page scraper (Tier 3)
//!
//! Last-resort gap filler for the industry code and the legal representation
//! section, which the structured sources often omit. The page markup is not
//! versioned; every lookup here degrades to `None` when the expected structure
//! is missing.
//!
//! Two ways in:
//! - `{base}/detalle/{web_id}/` when the registry API supplied a numeric web id
//! - `{base}/buscar/RM/{nit}` otherwise, following the first detail link
//!
//! `scraper::Html` is not `Send`, so pages are parsed in plain functions after
//! the body has been awaited.

use crate::dates::{to_iso_date, without_dates};
use crate::extractors::http::{build_client, send_checked};
use crate::identifier::BaseIdentifier;
use crate::types::{RegistryPageSource, ScrapedDetail, SourceError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use rues_common::config::SourcesConfig;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, info, warn};

/// Ancestors inspected when looking for a label's enclosing section
const MAX_CONTAINER_DEPTH: usize = 6;
const CONTAINER_TAGS: [&str; 4] = ["section", "div", "article", "main"];

static REPRESENTATION_LABELS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)^\s*representaci[oó]n?\s+legal\s*$").expect("valid regex"),
        Regex::new(r"(?i)^\s*representante\s+legal\s*$").expect("valid regex"),
    ]
});
static ACTIVITY_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*actividad\s+econ[oó]mica\s*$").expect("valid regex"));
static TRADE_NAME_LABELS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)^\s*sigla\s*:?\s*$").expect("valid regex"),
        Regex::new(r"(?i)sigla").expect("valid regex"),
    ]
});
static DATE_LABELS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)fecha\s+de\s+matr[íi]cula").expect("valid regex"),
        Regex::new(r"(?i)fecha\s+de\s+inscripci[óo]n").expect("valid regex"),
        Regex::new(r"(?i)fecha\s+de\s+constituci[óo]n").expect("valid regex"),
    ]
});
static CODE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{4})\s*$").expect("valid regex"));
static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));
static LABELED_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:ciiu|c[oó]digo)\D{0,20}?\b(\d{4})\b").expect("valid regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const NAME_SELECTORS: [&str; 3] = ["h1", "h2", "p.font-rues-large.filtro__titulo"];
const SEARCH_TITLE_SELECTOR: &str = "p.font-rues-large.filtro__titulo";

pub struct RegistryPageScraper {
    http_client: Client,
    web_base: String,
}

impl RegistryPageScraper {
    pub fn new(config: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    pub fn with_client(http_client: Client, config: &SourcesConfig) -> Self {
        Self {
            http_client,
            web_base: config.registry_web_base.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        let response = send_checked(self.http_client.get(url)).await?;
        let body = response.text().await?;
        info!(%url, bytes = body.len(), "Registry page fetched");
        Ok(body)
    }

    async fn scrape_by_web_id(&self, web_id: u64) -> Result<Option<ScrapedDetail>, SourceError> {
        let url = format!("{}/detalle/{}/", self.web_base, web_id);
        let body = self.fetch_page(&url).await?;
        let detail = parse_detail_page(&body);
        Ok((!detail.is_empty()).then_some(detail))
    }

    async fn scrape_by_search(
        &self,
        base_id: &BaseIdentifier,
    ) -> Result<Option<ScrapedDetail>, SourceError> {
        let search_url = format!("{}/buscar/RM/{}", self.web_base, base_id);
        let body = self.fetch_page(&search_url).await?;
        let search = parse_search_page(&body);

        let title_only = ScrapedDetail {
            legal_name: search.title.clone(),
            ..ScrapedDetail::default()
        };

        let Some(href) = search.detail_href else {
            warn!(url = %search_url, "No detail link on registry search page");
            return Ok((!title_only.is_empty()).then_some(title_only));
        };

        let detail_url = Url::parse(&self.web_base)
            .and_then(|base| base.join(&href))
            .map_err(|e| SourceError::Config(format!("Bad registry web base: {}", e)))?;

        let page = match self.fetch_page(detail_url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %detail_url, error = %e, "Registry detail page unavailable");
                return Ok((!title_only.is_empty()).then_some(title_only));
            }
        };

        let mut detail = parse_detail_page(&page);
        if search.title.is_some() {
            detail.legal_name = search.title;
        }
        Ok((!detail.is_empty()).then_some(detail))
    }
}

#[async_trait]
impl RegistryPageSource for RegistryPageScraper {
    fn source_id(&self) -> &'static str {
        "RegistryPage"
    }

    async fn scrape_detail(
        &self,
        web_id: Option<&str>,
        base_id: &BaseIdentifier,
    ) -> Result<Option<ScrapedDetail>, SourceError> {
        match web_id.and_then(|id| id.trim().parse::<u64>().ok()) {
            Some(id) => {
                debug!(web_id = id, "Scraping registry detail page by web id");
                self.scrape_by_web_id(id).await
            }
            None if base_id.is_empty() => Ok(None),
            None => {
                debug!(nit = %base_id, "Scraping registry detail page via search");
                self.scrape_by_search(base_id).await
            }
        }
    }
}

/// What the search results page offers
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Result title, usually the legal name
    pub title: Option<String>,
    /// Link to the first detail page, possibly relative
    pub detail_href: Option<String>,
}

pub fn parse_search_page(body: &str) -> SearchPage {
    let document = Html::parse_document(body);

    let title = select_text(&document, SEARCH_TITLE_SELECTOR);
    let detail_href = Selector::parse("a[href]").ok().and_then(|links| {
        document.select(&links).find_map(|a| {
            let href = a.value().attr("href")?;
            let text = collapse(&a.text().collect::<String>()).to_lowercase();
            let is_detail = href.contains("/detalle/")
                || text.contains("ver información")
                || text.contains("ver informacion");
            is_detail.then(|| href.to_string())
        })
    });

    SearchPage { title, detail_href }
}

/// Extract every recognisable field from a registry detail page
pub fn parse_detail_page(body: &str) -> ScrapedDetail {
    let document = Html::parse_document(body);
    let texts = text_nodes(&document);

    let legal_name = NAME_SELECTORS
        .iter()
        .find_map(|sel| select_text(&document, sel));

    let trade_name = TRADE_NAME_LABELS
        .iter()
        .find_map(|label| value_after_label(&texts, label));

    let registration_date = DATE_LABELS
        .iter()
        .find_map(|label| value_after_label(&texts, label))
        .and_then(|raw| to_iso_date(&raw));

    ScrapedDetail {
        legal_name,
        trade_name,
        registration_date,
        industry_code: industry_code(&document, &texts),
        legal_representation: legal_representation_fragment(&texts),
    }
}

/// A visible text node and the element that holds it
#[derive(Clone, Copy)]
struct TextNode<'a> {
    text: &'a str,
    parent: ElementRef<'a>,
}

/// Visible text nodes in document order
fn text_nodes(document: &Html) -> Vec<TextNode<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let parent = node.parent().and_then(ElementRef::wrap)?;
            if matches!(parent.value().name(), "script" | "style" | "noscript") {
                return None;
            }
            Some(TextNode {
                text: &**text,
                parent,
            })
        })
        .collect()
}

/// First non-blank text following a label, skipping anything that still matches the label
fn value_after_label(texts: &[TextNode<'_>], label: &Regex) -> Option<String> {
    let start = texts.iter().position(|t| label.is_match(t.text))?;
    texts[start..]
        .iter()
        .map(|t| t.text.trim())
        .find(|t| !t.is_empty() && !label.is_match(t))
        .map(collapse)
}

/// Nearest section-like ancestor holding more than the label itself
fn label_container<'a>(label: &TextNode<'a>) -> Option<ElementRef<'a>> {
    let label_text = collapse(label.text);
    let mut current = Some(label.parent);
    for _ in 0..MAX_CONTAINER_DEPTH {
        let element = current?;
        if CONTAINER_TAGS.contains(&element.value().name())
            && collapse(&element.text().collect::<Vec<_>>().join(" ")) != label_text
        {
            return Some(element);
        }
        current = element.parent().and_then(ElementRef::wrap);
    }
    None
}

/// Outer HTML of the legal representation section, verbatim
fn legal_representation_fragment(texts: &[TextNode<'_>]) -> Option<String> {
    let label = REPRESENTATION_LABELS
        .iter()
        .find_map(|re| texts.iter().find(|t| re.is_match(t.text)))?;
    label_container(label).map(|section| section.html())
}

/// Industry code from the economic-activity section, else any code-only link
///
/// Inside the section a code-only link wins, then a code next to a "CIIU" or
/// "Código" label, then any other 4-digit token that is not part of a date.
fn industry_code(document: &Html, texts: &[TextNode<'_>]) -> Option<String> {
    let anchors = Selector::parse("a").ok()?;

    let from_section = texts
        .iter()
        .find(|t| ACTIVITY_LABEL.is_match(t.text))
        .and_then(label_container)
        .and_then(|section| {
            section
                .select(&anchors)
                .find_map(|a| code_only(&a))
                .or_else(|| section_code(&section.text().collect::<Vec<_>>().join(" ")))
        });

    from_section.or_else(|| document.select(&anchors).find_map(|a| code_only(&a)))
}

fn section_code(text: &str) -> Option<String> {
    let text = without_dates(text);
    LABELED_CODE
        .captures(&text)
        .or_else(|| FOUR_DIGITS.captures(&text))
        .map(|c| c[1].to_string())
}

fn code_only(element: &ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    CODE_ONLY.captures(&text).map(|c| c[1].to_string())
}

/// Trimmed text of the first element matching `selector`, if non-blank
fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><head><title>RUES</title><script>var year = "2024";</script></head>
        <body>
          <h1> ACME   SOCIEDAD POR ACCIONES SIMPLIFICADA </h1>
          <div class="datos">
            <div class="fila"><span>Sigla</span><span>ACME SAS</span></div>
            <div class="fila"><span>Fecha de matrícula</span><span>09/03/2015</span></div>
            <div class="fila"><span>Renovado en</span><span>2024</span></div>
          </div>
          <section id="actividad">
            <h3>Actividad económica</h3>
            <ul><li><a href="/ciiu/4711">4711</a> Comercio al por menor</li></ul>
          </section>
          <section id="representacion">
            <h3>Representación legal</h3>
            <p>PRINCIPALES</p>
            <p>CC 1020304 - ANA MARIA PEREZ</p>
          </section>
        </body></html>
    "#;

    #[test]
    fn parses_full_detail_page() {
        let detail = parse_detail_page(DETAIL_PAGE);

        assert_eq!(
            detail.legal_name.as_deref(),
            Some("ACME SOCIEDAD POR ACCIONES SIMPLIFICADA")
        );
        assert_eq!(detail.trade_name.as_deref(), Some("ACME SAS"));
        assert_eq!(detail.registration_date.as_deref(), Some("2015-03-09"));
        assert_eq!(detail.industry_code.as_deref(), Some("4711"));

        let fragment = detail.legal_representation.unwrap();
        assert!(fragment.starts_with("<section id=\"representacion\">"));
        assert!(fragment.contains("ANA MARIA PEREZ"));
        assert!(!fragment.contains("4711"));
    }

    #[test]
    fn representation_label_tolerates_case_and_accents() {
        let page = r#"<div><div><b>REPRESENTACION LEGAL</b><p>JUAN ROJAS</p></div></div>"#;
        let detail = parse_detail_page(page);
        let fragment = detail.legal_representation.unwrap();
        assert!(fragment.contains("JUAN ROJAS"));

        let page = r#"<article><h4>Representante legal</h4><table><tr><td>LINA SOTO</td></tr></table></article>"#;
        let fragment = parse_detail_page(page).legal_representation.unwrap();
        assert!(fragment.starts_with("<article>"));
    }

    #[test]
    fn industry_code_prefers_activity_section_over_other_links() {
        let page = r#"
            <a href="/x">2023</a>
            <div><span>Actividad Economica</span><p>Principal: 6201 Desarrollo</p></div>
        "#;
        assert_eq!(parse_detail_page(page).industry_code.as_deref(), Some("6201"));
    }

    #[test]
    fn industry_code_skips_dates_in_activity_section() {
        let page = r#"<section><h3>Actividad económica</h3><p>Fecha de inicio 2015-03-09</p><p>CIIU 4711 Comercio</p></section>"#;
        assert_eq!(parse_detail_page(page).industry_code.as_deref(), Some("4711"));

        let page = r#"<div><b>Actividad economica</b><p>Desde 09/03/2015</p><p>4711 Comercio</p></div>"#;
        assert_eq!(parse_detail_page(page).industry_code.as_deref(), Some("4711"));
    }

    #[test]
    fn labeled_code_beats_earlier_numbers_in_section() {
        let page = r#"<section><h3>Actividad económica</h3><p>Empleados 1200</p><p>Código CIIU: 6201</p></section>"#;
        assert_eq!(parse_detail_page(page).industry_code.as_deref(), Some("6201"));
    }

    #[test]
    fn industry_code_falls_back_to_code_only_link() {
        let page = r#"<p>Renovado 2024</p><ul><li><a href="/c">0111</a></li></ul>"#;
        assert_eq!(parse_detail_page(page).industry_code.as_deref(), Some("0111"));
    }

    #[test]
    fn missing_structure_degrades_to_empty() {
        let detail = parse_detail_page("<html><body><p>Sin resultados</p></body></html>");
        assert!(detail.is_empty());
        assert!(parse_detail_page("").is_empty());
        assert!(parse_detail_page("<<<not html").is_empty());
    }

    #[test]
    fn search_page_yields_first_detail_link_and_title() {
        let page = r#"
            <p class="font-rues-large filtro__titulo">ACME SAS</p>
            <a href="/ayuda">Ayuda</a>
            <a href="/detalle/123456/">Ver información</a>
            <a href="/detalle/999/">Ver información</a>
        "#;
        let search = parse_search_page(page);
        assert_eq!(search.title.as_deref(), Some("ACME SAS"));
        assert_eq!(search.detail_href.as_deref(), Some("/detalle/123456/"));
    }

    #[test]
    fn search_page_accepts_link_by_text() {
        let page = r#"<a href="/expediente?id=5">  Ver Informacion </a>"#;
        let search = parse_search_page(page);
        assert_eq!(search.title, None);
        assert_eq!(search.detail_href.as_deref(), Some("/expediente?id=5"));
    }

    #[test]
    fn empty_search_page() {
        assert_eq!(parse_search_page("<html></html>"), SearchPage::default());
    }
}
