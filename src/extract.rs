//! Turns a listing page into post records and groups them into the
//! published result sets.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::text::clean;
use crate::timeparse;

/// Placeholder recorded when a row carries no time cell.
pub const UNKNOWN_TIME: &str = "unknown";

static SEL_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table.olt").unwrap());
static SEL_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static SEL_TITLE_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td.title").unwrap());
static SEL_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SEL_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("td.title span").unwrap());
static SEL_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/people/"]"#).unwrap());
static SEL_REPLIES: Lazy<Selector> = Lazy::new(|| Selector::parse("td.r-count").unwrap());
static SEL_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("td.time").unwrap());

/// One listing row. Constructed during a run, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Post {
    pub title: String,
    pub link: String,
    pub published: NaiveDateTime,
    /// The literal time text the page displayed.
    pub raw_time: String,
    pub replies: Option<u32>,
    pub author: Option<String>,
    pub tag: Option<String>,
    pub elite: bool,
}

/// Extract post records from a listing page body.
///
/// Rows without a title anchor are skipped; any other missing field degrades
/// to `None` or a sentinel, never to a row error.
pub fn parse_listing(body: &str, page_url: &str, now: NaiveDateTime, elite: bool) -> Vec<Post> {
    let document = Html::parse_document(body);
    let base = Url::parse(page_url).ok();

    let Some(table) = document.select(&SEL_TABLE).next() else {
        warn!(page = page_url, "post table (table.olt) not found");
        return Vec::new();
    };

    let mut posts = Vec::new();
    // The first row is the column header.
    for row in table.select(&SEL_ROW).skip(1) {
        let Some(title_cell) = row.select(&SEL_TITLE_CELL).next() else {
            continue;
        };
        let Some(anchor) = title_cell.select(&SEL_ANCHOR).next() else {
            continue;
        };

        // The anchor's title attribute carries the untruncated topic title;
        // the anchor text is an ellipsized fallback.
        let title = match anchor.value().attr("title") {
            Some(t) => clean(t),
            None => clean(&anchor.text().collect::<String>()),
        };
        if title.is_empty() {
            continue;
        }

        let link = match anchor.value().attr("href") {
            Some(href) => absolutize(base.as_ref(), href),
            None => continue,
        };

        let raw_time = row
            .select(&SEL_TIME)
            .next()
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_TIME.to_string());
        let published = timeparse::resolve(&raw_time, now);

        let replies = row
            .select(&SEL_REPLIES)
            .next()
            .and_then(|cell| cell.text().collect::<String>().trim().parse().ok());

        let author = row
            .select(&SEL_AUTHOR)
            .next()
            .map(|a| clean(&a.text().collect::<String>()))
            .filter(|s| !s.is_empty());

        let tag = row
            .select(&SEL_TAG)
            .next()
            .map(|s| clean(&s.text().collect::<String>()))
            .filter(|s| !s.is_empty());

        posts.push(Post {
            title,
            link,
            published,
            raw_time,
            replies,
            author,
            tag,
            elite,
        });
    }

    debug!(page = page_url, count = posts.len(), "extracted posts");
    posts
}

fn absolutize(base: Option<&Url>, href: &str) -> String {
    if let Ok(url) = Url::parse(href) {
        return url.into();
    }
    if let Some(base) = base {
        if let Ok(url) = base.join(href) {
            return url.into();
        }
    }
    href.to_string()
}

/// Discussion posts by normalized timestamp, newest first.
pub fn newest(mut posts: Vec<Post>, cap: usize) -> Vec<Post> {
    posts.sort_by(|a, b| b.published.cmp(&a.published));
    posts.truncate(cap);
    posts
}

/// Discussion posts by reply count, busiest first. Rows with no count sort
/// after every row that has one.
pub fn most_replied(mut posts: Vec<Post>, cap: usize) -> Vec<Post> {
    posts.sort_by(|a, b| b.replies.cmp(&a.replies));
    posts.truncate(cap);
    posts
}

/// Elite posts keep the page's editorial order.
pub fn curated(mut posts: Vec<Post>, cap: usize) -> Vec<Post> {
    posts.truncate(cap);
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const PAGE_URL: &str = "https://www.douban.com/group/713925/discussion";

    const LISTING: &str = r#"<html><body>
<table class="olt">
  <tr>
    <td class="title">讨论</td><td>作者</td><td class="r-count">回应</td><td class="time">最后回应</td>
  </tr>
  <tr>
    <td class="title">
      <a href="https://www.douban.com/group/topic/100001/" title="First topic, spelled out in full">First topic, spe...</a>
      <span>chat</span>
    </td>
    <td><a href="https://www.douban.com/people/alice/">alice</a></td>
    <td class="r-count">42</td>
    <td class="time">14:30</td>
  </tr>
  <tr>
    <td class="title"><a href="/group/topic/100002/">Second topic</a></td>
    <td><a href="https://www.douban.com/people/bob/">bob</a></td>
    <td class="r-count"></td>
    <td class="time">2023-12-25</td>
  </tr>
  <tr>
    <td class="title"><a href="https://www.douban.com/group/topic/100003/" title="Bare row">Bare row</a></td>
  </tr>
  <tr>
    <td>row without a title cell</td>
  </tr>
</table>
</body></html>"#;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn sample(title: &str, published: NaiveDateTime, replies: Option<u32>) -> Post {
        Post {
            title: title.to_string(),
            link: format!("https://www.douban.com/group/topic/{title}/"),
            published,
            raw_time: "14:30".to_string(),
            replies,
            author: None,
            tag: None,
            elite: false,
        }
    }

    #[test]
    fn extracts_well_formed_rows() {
        let posts = parse_listing(LISTING, PAGE_URL, now(), false);
        assert_eq!(posts.len(), 3);

        let first = &posts[0];
        assert_eq!(first.title, "First topic, spelled out in full");
        assert_eq!(first.link, "https://www.douban.com/group/topic/100001/");
        assert_eq!(first.raw_time, "14:30");
        assert_eq!(
            first.published,
            now().date().and_hms_opt(14, 30, 0).unwrap()
        );
        assert_eq!(first.replies, Some(42));
        assert_eq!(first.author.as_deref(), Some("alice"));
        assert_eq!(first.tag.as_deref(), Some("chat"));
        assert!(!first.elite);
    }

    #[test]
    fn relative_links_resolve_against_page_url() {
        let posts = parse_listing(LISTING, PAGE_URL, now(), false);
        assert_eq!(posts[1].link, "https://www.douban.com/group/topic/100002/");
    }

    #[test]
    fn anchor_text_is_title_fallback() {
        let posts = parse_listing(LISTING, PAGE_URL, now(), false);
        assert_eq!(posts[1].title, "Second topic");
    }

    #[test]
    fn empty_reply_cell_degrades_to_none() {
        let posts = parse_listing(LISTING, PAGE_URL, now(), false);
        assert_eq!(posts[1].replies, None);
    }

    #[test]
    fn missing_time_cell_uses_sentinel_and_reference_now() {
        let posts = parse_listing(LISTING, PAGE_URL, now(), false);
        let bare = &posts[2];
        assert_eq!(bare.raw_time, UNKNOWN_TIME);
        assert_eq!(bare.published, now());
    }

    #[test]
    fn rows_without_title_anchor_are_skipped() {
        // Header row plus the cell-less row both disappear.
        let posts = parse_listing(LISTING, PAGE_URL, now(), false);
        assert!(posts.iter().all(|p| !p.title.is_empty()));
        assert_eq!(posts.len(), 3);
    }

    #[test]
    fn missing_table_yields_empty_set() {
        let posts = parse_listing("<html><body><p>nothing</p></body></html>", PAGE_URL, now(), false);
        assert!(posts.is_empty());
    }

    #[test]
    fn elite_flag_is_carried() {
        let posts = parse_listing(LISTING, PAGE_URL, now(), true);
        assert!(posts.iter().all(|p| p.elite));
    }

    #[test]
    fn newest_sorts_descending_and_caps() {
        let t = now();
        let posts = vec![
            sample("old", t - chrono::Duration::days(2), None),
            sample("new", t, None),
            sample("mid", t - chrono::Duration::days(1), None),
        ];
        let set = newest(posts, 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].title, "new");
        assert_eq!(set[1].title, "mid");
    }

    #[test]
    fn most_replied_puts_missing_counts_last() {
        let t = now();
        let posts = vec![
            sample("none", t, None),
            sample("busy", t, Some(99)),
            sample("quiet", t, Some(1)),
        ];
        let set = most_replied(posts, 10);
        assert_eq!(set[0].title, "busy");
        assert_eq!(set[1].title, "quiet");
        assert_eq!(set[2].title, "none");
    }

    #[test]
    fn curated_keeps_source_order() {
        let t = now();
        let posts = vec![
            sample("a", t - chrono::Duration::days(1), Some(1)),
            sample("b", t, Some(5)),
            sample("c", t, None),
        ];
        let set = curated(posts, 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].title, "a");
        assert_eq!(set[1].title, "b");
    }
}
