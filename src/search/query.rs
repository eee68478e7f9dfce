//! Query construction and evaluation against the live index

use std::time::Instant;

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, TantivyDocument, Value};
use tantivy::snippet::{Snippet, SnippetGenerator};
use tantivy::{DocId, Score, SegmentReader, Term};

use crate::index::LiveIndex;
use crate::{GemplexError, Result};

use super::types::{
    ImageSearchResult, ImageSearchResponse, PageSearchResult, PageSearchResponse,
};

/// Fixed number of results per page
pub const PAGE_SIZE: usize = 15;

/// Document kinds excluded from page search results
const EXCLUDED_KINDS: [&str; 3] = ["email", "rfc", "irc"];

/// Title matches weigh double relative to content matches
const TITLE_BOOST: f32 = 2.0;

/// Evaluates a page search.
///
/// The user query should-match content and title (title boosted); email,
/// rfc and irc documents are excluded. Hits are ordered by
/// `(score + 1) × (urlRank + 1)` descending, with the rank read from the
/// document's numeric fast field.
pub fn search_pages(
    live: &LiveIndex,
    query_str: &str,
    page: usize,
    highlight_style: &str,
) -> Result<PageSearchResponse> {
    if page < 1 {
        return Err(GemplexError::Search(
            "Invalid page number (needs to be greater than or equal to 1)".to_string(),
        ));
    }

    let started = Instant::now();
    let searcher = live.reader.searcher();
    let fields = &live.fields;

    let mut parser = QueryParser::for_index(&live.index, vec![fields.title, fields.content]);
    parser.set_field_boost(fields.title, TITLE_BOOST);
    let (user_query, _) = parser.parse_query_lenient(query_str);

    let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, user_query)];
    for kind in EXCLUDED_KINDS {
        clauses.push((
            Occur::MustNot,
            Box::new(TermQuery::new(
                Term::from_field_text(fields.kind, kind),
                IndexRecordOption::Basic,
            )),
        ));
    }
    let query = BooleanQuery::new(clauses);

    let collector = TopDocs::with_limit(PAGE_SIZE)
        .and_offset((page - 1) * PAGE_SIZE)
        .tweak_score(move |segment_reader: &SegmentReader| {
            let ranks = segment_reader.fast_fields().f64("url_rank").ok();
            move |doc: DocId, score: Score| {
                let rank = ranks.as_ref().and_then(|column| column.first(doc)).unwrap_or(0.0);
                (score as f64 + 1.0) * (rank + 1.0)
            }
        });

    let (hits, total) = searcher.search(&query, &(collector, Count))?;

    let snippet_generator = SnippetGenerator::create(&searcher, &query, fields.content)?;
    let (open, close) = highlight_markers(highlight_style);

    let mut results = Vec::with_capacity(hits.len());
    for (tweaked, address) in hits {
        let doc: TantivyDocument = searcher.doc(address)?;

        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let url_rank = doc
            .get_first(fields.url_rank)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let host_rank = doc
            .get_first(fields.host_rank)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let content_size = doc
            .get_first(fields.content_size)
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        // the collector score is (relevance+1)(rank+1); undo the rank
        // factor to report raw relevance like the index computed it
        let relevance = tweaked / (url_rank + 1.0) - 1.0;

        // single line, so clients that render preformatted text don't
        // explode the snippet over many lines
        let snippet = snippet_generator.snippet_from_doc(&doc);
        let snippet = format!(" {}", render_snippet(&snippet, open, close).replace('\n', " "));

        results.push(PageSearchResult {
            url: text(fields.url),
            title: text(fields.title),
            snippet,
            url_rank,
            host_rank,
            relevance,
            content_type: text(fields.content_type),
            content_size,
        });
    }

    Ok(PageSearchResponse {
        total_results: total as u64,
        results,
        duration: started.elapsed().as_millis() as u64,
        err: String::new(),
    })
}

/// Evaluates an image search over alt text, relevance-ordered
pub fn search_images(
    live: &LiveIndex,
    query_str: &str,
    page: usize,
) -> Result<ImageSearchResponse> {
    if page < 1 {
        return Err(GemplexError::Search(
            "Invalid page number (needs to be greater than or equal to 1)".to_string(),
        ));
    }

    let started = Instant::now();
    let searcher = live.reader.searcher();
    let fields = &live.fields;

    let parser = QueryParser::for_index(&live.index, vec![fields.alt]);
    let (query, _) = parser.parse_query_lenient(query_str);

    let collector = TopDocs::with_limit(PAGE_SIZE).and_offset((page - 1) * PAGE_SIZE);
    let (hits, total) = searcher.search(&query, &(collector, Count))?;

    let mut results = Vec::with_capacity(hits.len());
    for (score, address) in hits {
        let doc: TantivyDocument = searcher.doc(address)?;

        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let fetch_time = doc
            .get_first(fields.fetch_time)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        results.push(ImageSearchResult {
            image_hash: text(fields.image_hash),
            image: text(fields.image),
            alt: text(fields.alt),
            source_url: text(fields.image_url),
            fetch_time,
            relevance: score as f64,
        });
    }

    Ok(ImageSearchResponse {
        total_results: total as u64,
        results,
        duration: started.elapsed().as_millis() as u64,
        err: String::new(),
    })
}

/// Snippet delimiters per highlight style; `gem` brackets matches so
/// gemtext clients can render them
fn highlight_markers(style: &str) -> (&'static str, &'static str) {
    match style {
        "ansi" => ("\u{1b}[1m", "\u{1b}[0m"),
        _ => ("[[", "]]"),
    }
}

/// Renders a snippet fragment with the highlighted ranges wrapped in the
/// given markers
fn render_snippet(snippet: &Snippet, open: &str, close: &str) -> String {
    let fragment = snippet.fragment();
    let mut out = String::with_capacity(fragment.len() + 16);
    let mut cursor = 0;
    for range in snippet.highlighted() {
        if range.start < cursor || range.end > fragment.len() {
            continue;
        }
        out.push_str(&fragment[cursor..range.start]);
        out.push_str(open);
        out.push_str(&fragment[range.start..range.end]);
        out.push_str(close);
        cursor = range.end;
    }
    out.push_str(&fragment[cursor..]);
    out
}
