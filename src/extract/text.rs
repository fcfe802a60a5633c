use scraper::{Html, Selector};

/// Bodies shorter than this are stubs or teasers, not articles.
pub const MIN_BODY_CHARS: usize = 120;
pub const MAX_BODY_CHARS: usize = 5000;

/// Containers likely to hold the article body, most specific first.
const CANDIDATE_SELECTORS: &[&str] = &[
    "article",
    "[itemprop=\"articleBody\"]",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".td-post-content",
    ".content",
    "main",
];

/// Pull the most likely article body out of a page.
///
/// Tries each candidate selector (a site-specific one first, when
/// configured) and keeps the longest text found; falls back to joining
/// every `<p>` on the page. Output is whitespace-normalized and capped at
/// [`MAX_BODY_CHARS`].
pub fn extract_article_text(page_html: &str, content_selector: Option<&str>) -> Option<String> {
    let document = Html::parse_document(page_html);

    let mut best = String::new();
    let custom = content_selector.into_iter();
    for sel in custom.chain(CANDIDATE_SELECTORS.iter().copied()) {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = normalize(element.text());
            if text.chars().count() > best.chars().count() {
                best = text;
            }
        }
    }

    if best.is_empty() {
        // No container matched; concatenate every paragraph.
        let p = Selector::parse("p").unwrap();
        let joined = document
            .select(&p)
            .map(|el| normalize(el.text()))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        best = joined;
    }

    if best.is_empty() {
        None
    } else {
        Some(truncate_chars(&best, MAX_BODY_CHARS))
    }
}

/// Flatten the RSS summary/content HTML to plain text. Used when the page
/// fetch fails or yields nothing usable.
pub fn summary_text(summary_html: &str) -> Option<String> {
    let text = html2text::from_read(summary_html.as_bytes(), 80).ok()?;

    let cleaned: String = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.is_empty() {
        None
    } else {
        Some(truncate_chars(&cleaned, MAX_BODY_CHARS))
    }
}

fn normalize<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined = parts.collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_article_container_over_boilerplate() {
        let html = r#"
        <html><body>
          <nav><p>Accueil Contact Mentions légales</p></nav>
          <article><p>Le texte principal de l'article, nettement plus long que
          la navigation, avec plusieurs phrases qui racontent les faits du jour
          et quelques détails supplémentaires pour faire bonne mesure.</p></article>
        </body></html>"#;
        let text = extract_article_text(html, None).unwrap();
        assert!(text.contains("texte principal"));
        assert!(!text.contains("Mentions légales"));
    }

    #[test]
    fn custom_selector_wins_when_longer() {
        let html = r#"
        <html><body>
          <div class="story-body"><p>Contenu choisi par le sélecteur du site,
          assez long pour battre les candidats génériques qui ne matchent rien
          d'autre sur cette page minimaliste.</p></div>
        </body></html>"#;
        let text = extract_article_text(html, Some(".story-body")).unwrap();
        assert!(text.starts_with("Contenu choisi"));
    }

    #[test]
    fn falls_back_to_paragraphs() {
        let html = "<html><body><div><p>Premier paragraphe.</p><p>Deuxième paragraphe.</p></div></body></html>";
        // ".content"/"main"/"article" do not match; <p> fallback applies via
        // the generic candidates only if none matched. Here "div" is not a
        // candidate, so the paragraph join kicks in.
        let text = extract_article_text(html, None).unwrap();
        assert!(text.contains("Premier paragraphe."));
        assert!(text.contains("Deuxième paragraphe."));
    }

    #[test]
    fn whitespace_is_collapsed() {
        let html = "<article>Du   texte\n\n  avec    des blancs</article>";
        let text = extract_article_text(html, None).unwrap();
        assert_eq!(text, "Du texte avec des blancs");
    }

    #[test]
    fn output_is_capped_on_a_char_boundary() {
        let long = "é".repeat(MAX_BODY_CHARS + 500);
        let html = format!("<article>{}</article>", long);
        let text = extract_article_text(&html, None).unwrap();
        assert_eq!(text.chars().count(), MAX_BODY_CHARS);
    }

    #[test]
    fn empty_page_yields_none() {
        assert_eq!(extract_article_text("<html><body></body></html>", None), None);
    }

    #[test]
    fn summary_html_is_flattened() {
        let text = summary_text("<p>Un <b>résumé</b> court.</p>").unwrap();
        assert!(text.contains("résumé"));
        assert!(!text.contains('<'));
    }
}
