//! Full-text index schema
//!
//! One schema serves both document kinds: pages carry title/content and
//! the rank fast fields, images carry alt text and the inline encoded
//! image. Neither kind's query fields overlap the other's, so page
//! queries never match image documents and vice versa.

use tantivy::schema::{Field, Schema, FAST, STORED, STRING, TEXT};

/// Resolved field handles for the index schema
#[derive(Debug, Clone, Copy)]
pub struct IndexFields {
    pub url: Field,
    pub title: Field,
    pub content: Field,
    pub lang: Field,
    pub kind: Field,
    pub content_type: Field,
    pub content_size: Field,
    pub links: Field,
    pub url_rank: Field,
    pub host_rank: Field,

    pub image_hash: Field,
    pub image: Field,
    pub alt: Field,
    pub image_url: Field,
    pub fetch_time: Field,
}

/// Builds the schema used for every index slot
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field("url", STRING | STORED);
    builder.add_text_field("title", TEXT | STORED);
    builder.add_text_field("content", TEXT | STORED);
    builder.add_text_field("lang", STRING);
    builder.add_text_field("kind", STRING);
    builder.add_text_field("content_type", STRING | STORED);
    builder.add_u64_field("content_size", STORED);
    builder.add_text_field("links", TEXT);
    builder.add_f64_field("url_rank", FAST | STORED);
    builder.add_f64_field("host_rank", FAST | STORED);

    builder.add_text_field("image_hash", STRING | STORED);
    builder.add_text_field("image", STORED);
    builder.add_text_field("alt", TEXT | STORED);
    builder.add_text_field("image_url", STRING | STORED);
    builder.add_i64_field("fetch_time", STORED);

    builder.build()
}

/// Resolves the field handles of a schema built by [`build_schema`]
pub fn resolve_fields(schema: &Schema) -> tantivy::Result<IndexFields> {
    Ok(IndexFields {
        url: schema.get_field("url")?,
        title: schema.get_field("title")?,
        content: schema.get_field("content")?,
        lang: schema.get_field("lang")?,
        kind: schema.get_field("kind")?,
        content_type: schema.get_field("content_type")?,
        content_size: schema.get_field("content_size")?,
        links: schema.get_field("links")?,
        url_rank: schema.get_field("url_rank")?,
        host_rank: schema.get_field("host_rank")?,
        image_hash: schema.get_field("image_hash")?,
        image: schema.get_field("image")?,
        alt: schema.get_field("alt")?,
        image_url: schema.get_field("image_url")?,
        fetch_time: schema.get_field("fetch_time")?,
    })
}
