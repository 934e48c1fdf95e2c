// Server-rendered HTML for the search form and result cards

#[cfg(test)]
mod tests;

use std::fmt::Write as _;

use crate::corpus::DifficultyLevel;
use crate::scrapers::http::validate_url;
use crate::search::SearchResult;

const STYLE: &str = "body{font-family:sans-serif;max-width:860px;margin:2em auto;padding:0 1em}\
form{display:flex;gap:.5em;flex-wrap:wrap;margin-bottom:1.5em}\
input[type=text]{flex:1;min-width:16em;padding:.4em}\
.card{border-radius:6px;padding:.8em 1em;margin:.6em 0}\
.card h3{margin:.1em 0 .3em}.meta{font-size:.9em;color:#333}\
.message{padding:1em;background:#f4f4f4;border-radius:6px}";

/// Escape text for use in element content and quoted attributes
#[inline]
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Values echoed back into the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValues<'a> {
    pub query: &'a str,
    pub difficulty: Option<DifficultyLevel>,
    pub num_results: usize,
    pub min_results: usize,
    pub max_results: usize,
}

/// What to show under the form
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageBody<'a> {
    Empty,
    Message(&'a str),
    Results {
        results: &'a [SearchResult],
        query_difficulty: DifficultyLevel,
    },
}

#[inline]
pub fn render_page(form: &FormValues<'_>, body: PageBody<'_>) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Superconductivity Search</title><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body><h1>Superconductivity Search</h1>");
    html.push_str("<p>Semantic search over encyclopedias, lectures, reviews and research papers, ranked for the level your question is asked at.</p>");
    render_form(&mut html, form);

    match body {
        PageBody::Empty => {}
        PageBody::Message(message) => {
            let _ = write!(html, "<div class=\"message\">{}</div>", html_escape(message));
        }
        PageBody::Results {
            results,
            query_difficulty,
        } => {
            let _ = write!(
                html,
                "<p class=\"meta\">Detected query level: {}</p>",
                html_escape(&query_difficulty.to_string())
            );
            for result in results {
                render_card(&mut html, result);
            }
        }
    }

    html.push_str("</body></html>");
    html
}

fn render_form(html: &mut String, form: &FormValues<'_>) {
    let _ = write!(
        html,
        "<form method=\"get\" action=\"/\"><input type=\"text\" name=\"q\" placeholder=\"e.g. How do Cooper pairs form?\" value=\"{}\">",
        html_escape(form.query)
    );

    html.push_str("<select name=\"difficulty\">");
    let selected = |on: bool| if on { " selected" } else { "" };
    let _ = write!(
        html,
        "<option value=\"all\"{}>All levels</option>",
        selected(form.difficulty.is_none())
    );
    for level in DifficultyLevel::ALL {
        let _ = write!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            level.get(),
            selected(form.difficulty == Some(level)),
            html_escape(&level.to_string())
        );
    }
    html.push_str("</select>");

    let _ = write!(
        html,
        "<input type=\"number\" name=\"results\" min=\"{}\" max=\"{}\" value=\"{}\"><button type=\"submit\">Search</button></form>",
        form.min_results, form.max_results, form.num_results
    );
}

fn render_card(html: &mut String, result: &SearchResult) {
    let level = result.difficulty_level;
    // Only http(s) links are clickable
    let href = if validate_url(&result.url).is_ok() {
        result.url.as_str()
    } else {
        "#"
    };
    let _ = write!(
        html,
        "<div class=\"card\" style=\"background:{}\"><h3>{}. <a href=\"{}\">{}</a></h3>\
         <div class=\"meta\">Score {:.3} | {} | {} | {} words</div></div>",
        level.color(),
        result.rank,
        html_escape(href),
        html_escape(&result.title),
        result.score,
        html_escape(&result.source),
        html_escape(&level.to_string()),
        result.word_count
    );
}
