//! RSS 2.0 emission.
//!
//! One feed kind per output file. The file set is fixed per group id, so
//! downstream readers always find every feed; a run that produced no data
//! still writes structurally valid zero-item documents.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::info;

use crate::config::Config;
use crate::extract::Post;
use crate::text::sanitize_xml_text;

/// Cap on any single text element; keeps one pathological row from bloating
/// the whole feed.
const MAX_TEXT_LEN: usize = 4096;

/// The three published result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Newest,
    MostReplied,
    Elite,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::Newest, FeedKind::MostReplied, FeedKind::Elite];

    pub fn file_name(&self, group_id: &str) -> String {
        match self {
            FeedKind::Newest => format!("douban_{group_id}.xml"),
            FeedKind::MostReplied => format!("douban_{group_id}_popular.xml"),
            FeedKind::Elite => format!("douban_{group_id}_elite.xml"),
        }
    }

    pub fn path(&self, config: &Config) -> PathBuf {
        config.out_dir.join(self.file_name(&config.group_id))
    }

    fn title(&self, group_id: &str) -> String {
        match self {
            FeedKind::Newest => format!("Douban group {group_id}: latest topics"),
            FeedKind::MostReplied => format!("Douban group {group_id}: most replied"),
            FeedKind::Elite => format!("Douban group {group_id}: elite picks"),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            FeedKind::Newest => "Latest discussion topics scraped from the group listing",
            FeedKind::MostReplied => "Discussion topics ranked by reply count",
            FeedKind::Elite => "Editorially highlighted topics from the group",
        }
    }
}

/// Write the feed file for `kind`. An empty `posts` slice still produces a
/// valid zero-item feed.
pub fn write_feed(config: &Config, kind: FeedKind, posts: &[Post]) -> Result<()> {
    let xml = render(config, kind, posts, None)?;
    let path = kind.path(config);
    write_file(&path, &xml)?;
    info!(path = %path.display(), items = posts.len(), "feed written");
    Ok(())
}

/// Write the placeholder used when a run could not produce data. The file
/// must exist regardless, so readers see an empty feed instead of a 404.
pub fn write_error_feed(config: &Config, kind: FeedKind, note: &str) -> Result<()> {
    let xml = render(config, kind, &[], Some(note))?;
    let path = kind.path(config);
    write_file(&path, &xml)?;
    info!(path = %path.display(), "placeholder feed written");
    Ok(())
}

fn write_file(path: &Path, xml: &[u8]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(xml)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn render(config: &Config, kind: FeedKind, posts: &[Post], note: Option<&str>) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &kind.title(&config.group_id))?;
    write_text_element(&mut writer, "link", &config.group_url())?;
    write_text_element(&mut writer, "description", note.unwrap_or_else(|| kind.description()))?;
    write_text_element(&mut writer, "language", "zh-cn")?;

    for post in posts {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &post.title)?;
        write_text_element(&mut writer, "link", &post.link)?;
        write_text_element(&mut writer, "pubDate", &format_pub_date(&post.published))?;
        write_text_element(&mut writer, "description", &item_description(post))?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;
    Ok(writer.into_inner())
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    let mut s = sanitize_xml_text(text);
    if s.len() > MAX_TEXT_LEN {
        // Cut on a char boundary at or below the cap.
        let cut = (0..=MAX_TEXT_LEN)
            .rev()
            .find(|&i| s.is_char_boundary(i))
            .unwrap_or(0);
        s.truncate(cut);
        s.push_str("… (truncated)");
    }
    w.write_event(Event::Text(BytesText::new(&s)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// RFC-822 style date string. The site shows naive local times; the GMT
/// label is nominal, consumers only need a stable RFC-822 shape.
fn format_pub_date(ts: &NaiveDateTime) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn item_description(post: &Post) -> String {
    let mut description = format!("Posted at {}", post.raw_time);
    if let Some(author) = &post.author {
        description.push_str(&format!(" by {author}"));
    }
    if let Some(replies) = post.replies {
        description.push_str(&format!(", {replies} replies"));
    }
    if let Some(tag) = &post.tag {
        description.push_str(&format!(" [{tag}]"));
    }
    if post.elite {
        description.push_str(" (elite)");
    }
    description
}
