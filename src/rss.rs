use chrono::{DateTime, Utc};

use crate::config::APP_NAME;
use crate::models::Post;

/// Render the public RSS 2.0 channel. Valid with an empty item list.
pub fn render_channel(base_url: &str, posts: &[Post]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut items = String::new();

    for post in posts {
        let pub_date = rfc822(post.publish_at.unwrap_or(post.updated_at));
        let enclosure = post
            .image_url
            .as_deref()
            .map(|url| {
                let absolute = if url.starts_with("http") {
                    url.to_string()
                } else {
                    format!("{}{}", base, url)
                };
                format!(
                    "\n    <enclosure url=\"{}\" length=\"0\" type=\"{}\"/>",
                    xml_escape(&absolute),
                    mime_for(&absolute)
                )
            })
            .unwrap_or_default();

        items.push_str(&format!(
            r#"
  <item>
    <title>{title}</title>
    <link>{link}</link>
    <guid isPermaLink="false">{guid}</guid>
    <description><![CDATA[{body}]]></description>{enclosure}
    <pubDate>{pub_date}</pubDate>
  </item>"#,
            title = xml_escape(&post.title),
            link = xml_escape(&post.orig_link),
            guid = xml_escape(&post.guid),
            body = cdata_safe(&post.body),
            enclosure = enclosure,
            pub_date = pub_date,
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>{title} — Flux publié</title>
  <link>{base}/</link>
  <description>Articles approuvés</description>{items}
</channel>
</rss>"#,
        title = xml_escape(APP_NAME),
        base = base,
        items = items,
    )
}

fn rfc822(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A literal "]]>" inside a CDATA section would end it early.
fn cdata_safe(s: &str) -> String {
    s.replace("]]>", "]]]]><![CDATA[>")
}

fn mime_for(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
