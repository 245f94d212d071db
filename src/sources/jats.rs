//! JATS article documents: a minimal element tree and the mapping of an
//! article onto [`Paper`].
//!
//! JATS article metadata is queried by element name and attribute, the way a
//! CSS selector would; a small owned tree keeps those lookups simple.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::ScraperError;
use crate::models::{
    Author, Institution, Link, MalformedRecordError, Paper, PaperAuthor, PaperBuilder, Quality,
    Release, Venue, VenueType,
};
use crate::utils::{resolve_date, FetchError, ResolvedDate};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, ScraperError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr.unescape_value()?.to_string();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All descendant elements named `name`, in document order
    pub(crate) fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.name == name {
                    found.push(el);
                }
                el.collect(name, found);
            }
        }
    }

    /// First descendant element named `name`
    pub(crate) fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| match child {
            Node::Element(el) if el.name == name => Some(el),
            Node::Element(el) => el.find(name),
            Node::Text(_) => None,
        })
    }

    /// First descendant named `name` whose `key` attribute equals `value`
    pub(crate) fn find_with(&self, name: &str, key: &str, value: &str) -> Option<&Element> {
        self.find_all(name)
            .into_iter()
            .find(|el| el.attr(key) == Some(value))
    }

    /// Text content with whitespace runs collapsed
    pub(crate) fn text(&self) -> String {
        let mut raw = String::new();
        self.push_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn push_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => el.push_text(out),
            }
        }
    }
}

/// Parse a document into a tree rooted at a synthetic `#document` element
pub(crate) fn parse(xml: &str) -> Result<Element, ScraperError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut stack = vec![Element {
        name: "#document".to_string(),
        attrs: Vec::new(),
        children: Vec::new(),
    }];

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => stack.push(Element::from_start(e)?),
            Event::Empty(ref e) => {
                let el = Element::from_start(e)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Element(el));
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(unbalanced());
                }
                if let Some(el) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Element(el));
                    }
                }
            }
            Event::Text(e) => {
                // Entities outside the predefined XML set are kept verbatim
                let text = match e.unescape() {
                    Ok(text) => text.to_string(),
                    Err(_) => String::from_utf8_lossy(&e).to_string(),
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(String::from_utf8_lossy(&e).to_string()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(unbalanced()),
    }
}

fn unbalanced() -> ScraperError {
    ScraperError::Fetch(FetchError::Decode("XML: unbalanced elements".to_string()))
}

/// Parse a JATS document and build a [`Paper`] from its article metadata.
///
/// `record` names the document in errors; `links` are attached as given.
pub(crate) fn paper_from_jats(
    xml: &str,
    record: &str,
    links: Vec<Link>,
) -> Result<Paper, ScraperError> {
    paper_from_article(&parse(xml)?, record, links)
}

/// Build a [`Paper`] from an already parsed JATS document
pub(crate) fn paper_from_article(
    root: &Element,
    record: &str,
    links: Vec<Link>,
) -> Result<Paper, ScraperError> {
    let title = root
        .find("article-title")
        .map(Element::text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MalformedRecordError::MissingField {
            record: record.to_string(),
            field: "article-title",
        })?;

    let mut builder = PaperBuilder::new(title, Quality::scraped())
        .abstract_text(root.find("abstract").map(Element::text).unwrap_or_default())
        .authors(authors(root))
        .topics(
            root.find_all("kwd-group")
                .into_iter()
                .flat_map(|group| group.find_all("kwd"))
                .map(Element::text),
        );
    for link in links {
        builder = builder.link(link);
    }

    if let Some(release) = journal_release(root)? {
        builder = builder.release(release);
    }

    Ok(builder.build())
}

/// Authors with a surname, in document order
fn authors(root: &Element) -> Vec<PaperAuthor> {
    root.find_all("contrib")
        .into_iter()
        .filter(|c| c.attr("contrib-type") == Some("author"))
        .filter_map(|contrib| {
            let surname = contrib.find("surname")?.text();
            let name = contrib
                .find_all("given-names")
                .into_iter()
                .map(Element::text)
                .chain(std::iter::once(surname))
                .collect::<Vec<_>>()
                .join(" ");

            let affiliations = contrib
                .find_all("xref")
                .into_iter()
                .filter(|x| x.attr("ref-type") == Some("aff"))
                .filter_map(|x| x.attr("rid"))
                .flat_map(str::split_whitespace)
                .filter_map(|rid| affiliation(root, rid))
                .collect();

            Some(PaperAuthor {
                author: Author::named(name),
                affiliations,
            })
        })
        .collect()
}

fn affiliation(root: &Element, rid: &str) -> Option<Institution> {
    let aff = root.find_with("aff", "id", rid)?;
    let text = aff
        .find("institution")
        .map(Element::text)
        .unwrap_or_else(|| aff.text());
    let name = text.trim_start_matches(|c: char| c.is_ascii_digit()).trim();
    (!name.is_empty()).then(|| Institution::unknown(name))
}

fn journal_release(root: &Element) -> Result<Option<Release>, ScraperError> {
    let Some(journal) = root
        .find("journal-meta")
        .and_then(|meta| meta.find("journal-title"))
        .map(Element::text)
    else {
        return Ok(None);
    };

    let publisher = root
        .find("journal-meta")
        .and_then(|meta| meta.find("publisher-name"))
        .map(Element::text);

    let resolved = publication_date(root)?;

    let mut venue = Venue::new(
        journal,
        VenueType::Journal,
        resolved.date,
        resolved.precision,
        Quality::scraped(),
    )
    .with_publisher(publisher);
    venue.volume = root
        .find("article-meta")
        .and_then(|meta| meta.find("volume"))
        .map(Element::text);

    Ok(Some(Release::published(venue)))
}

/// Publication date: a `date-type="pub"` string date, else the first of the
/// print, publication and electronic dates with a year
fn publication_date(root: &Element) -> Result<ResolvedDate, ScraperError> {
    let string_date = root
        .find_with("pub-date", "date-type", "pub")
        .and_then(|d| d.find("string-date"))
        .and_then(|s| ResolvedDate::parse(&s.text()).ok());
    if let Some(resolved) = string_date {
        return Ok(resolved);
    }

    let candidates = [
        ("pub-type", "ppub"),
        ("date-type", "pub"),
        ("pub-type", "epub"),
    ]
    .map(|(key, value)| root.find_with("pub-date", key, value).and_then(date_parts));

    Ok(resolve_date(None, candidates.iter().map(|c| c.as_deref()))?)
}

fn date_parts(pub_date: &Element) -> Option<Vec<i32>> {
    let component = |name: &str| {
        pub_date
            .find(name)
            .and_then(|el| el.text().parse::<i32>().ok())
    };

    let mut parts = vec![component("year")?];
    if let Some(month) = component("month") {
        parts.push(month);
        parts.extend(component("day"));
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatePrecision;
    use crate::utils::DateResolutionError;
    use chrono::NaiveDate;

    const DOC: &str = r#"<?xml version="1.0"?>
<article>
  <front>
    <journal-meta><journal-title>bioRxiv</journal-title></journal-meta>
    <article-meta>
      <title-group><article-title>Cells &amp; <italic>things</italic></article-title></title-group>
      <aff id="a1"><label>1</label>Institute of Cells</aff>
      <xref ref-type="aff" rid="a1"/>
    </article-meta>
  </front>
</article>"#;

    #[test]
    fn test_parse_and_query() {
        let root = parse(DOC).unwrap();

        assert_eq!(root.find("article-title").unwrap().text(), "Cells & things");
        assert_eq!(root.find("journal-title").unwrap().text(), "bioRxiv");
        assert_eq!(
            root.find_with("aff", "id", "a1").unwrap().text(),
            "1Institute of Cells"
        );
        assert_eq!(root.find("xref").unwrap().attr("rid"), Some("a1"));
        assert_eq!(root.find_all("aff").len(), 1);
        assert!(root.find("abstract").is_none());
    }

    #[test]
    fn test_unbalanced_document() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a>").is_err());
    }

    const RECORD: &str = "10.1101/2020.06.01.000001";

    const ARTICLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<article>
  <front>
    <journal-meta>
      <journal-title-group><journal-title>bioRxiv</journal-title></journal-title-group>
      <publisher><publisher-name>Cold Spring Harbor Laboratory</publisher-name></publisher>
    </journal-meta>
    <article-meta>
      <title-group>
        <article-title>Mapping <italic>cells</italic> at scale</article-title>
      </title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <name><surname>Curie</surname><given-names>Marie</given-names></name>
          <xref ref-type="aff" rid="a1">1</xref>
          <xref ref-type="aff" rid="a2">2</xref>
        </contrib>
        <contrib contrib-type="author">
          <collab>The Consortium</collab>
        </contrib>
        <contrib contrib-type="editor">
          <name><surname>Editor</surname><given-names>Ed</given-names></name>
        </contrib>
        <aff id="a1"><label>1</label>Institut du Radium</aff>
        <aff id="a2"><institution>2Sorbonne</institution></aff>
      </contrib-group>
      <pub-date pub-type="epub"><year>2020</year><month>06</month><day>03</day></pub-date>
      <pub-date pub-type="ppub"><year>2020</year><month>6</month></pub-date>
      <abstract><p>We map cells.</p></abstract>
      <kwd-group><kwd>cells</kwd><kwd>atlas</kwd></kwd-group>
    </article-meta>
  </front>
</article>"#;

    const EPUB: &str =
        r#"<pub-date pub-type="epub"><year>2020</year><month>06</month><day>03</day></pub-date>"#;
    const PPUB: &str = r#"<pub-date pub-type="ppub"><year>2020</year><month>6</month></pub-date>"#;

    fn doi_links() -> Vec<Link> {
        vec![Link::new("doi", RECORD)]
    }

    #[test]
    fn test_paper_from_jats() {
        let paper = paper_from_jats(ARTICLE, RECORD, doi_links()).unwrap();

        assert_eq!(paper.title, "Mapping cells at scale");
        assert_eq!(paper.r#abstract, "We map cells.");
        assert_eq!(paper.author_names(), vec!["Marie Curie"]);
        let affs: Vec<_> = paper.authors[0]
            .affiliations
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(affs, vec!["Institut du Radium", "Sorbonne"]);
        assert_eq!(paper.topics, vec!["cells", "atlas"]);
        assert_eq!(paper.link("doi").unwrap().target, RECORD);

        let venue = &paper.releases[0].venue;
        assert_eq!(venue.name, "bioRxiv");
        assert_eq!(venue.kind, VenueType::Journal);
        assert_eq!(
            venue.publisher.as_deref(),
            Some("Cold Spring Harbor Laboratory")
        );
        // ppub outranks epub
        assert_eq!(venue.date, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
        assert_eq!(venue.date_precision, DatePrecision::Month);
    }

    #[test]
    fn test_links_are_attached_as_given() {
        let links = vec![Link::new("pmc", "7000001"), Link::new("doi", RECORD)];

        let paper = paper_from_jats(ARTICLE, "7000001", links).unwrap();

        assert_eq!(paper.links.len(), 2);
        assert_eq!(paper.link("pmc").unwrap().target, "7000001");
        assert_eq!(paper.link("doi").unwrap().target, RECORD);
    }

    #[test]
    fn test_string_date_wins() {
        let string_date =
            r#"<pub-date date-type="pub"><string-date>2021-02-03</string-date></pub-date>"#;
        let xml = ARTICLE.replace(EPUB, &format!("{}{}", string_date, EPUB));

        let paper = paper_from_jats(&xml, RECORD, doi_links()).unwrap();

        assert_eq!(
            paper.releases[0].venue.date,
            NaiveDate::from_ymd_opt(2021, 2, 3).unwrap()
        );
        assert_eq!(paper.releases[0].venue.date_precision, DatePrecision::Day);
    }

    #[test]
    fn test_no_journal_title_means_no_release() {
        let xml = ARTICLE.replace("<journal-title>bioRxiv</journal-title>", "");
        let paper = paper_from_jats(&xml, RECORD, doi_links()).unwrap();
        assert!(paper.releases.is_empty());
    }

    #[test]
    fn test_journal_without_date_fails_record() {
        let xml = ARTICLE.replace(EPUB, "").replace(PPUB, "");

        assert_eq!(
            paper_from_jats(&xml, RECORD, doi_links()).unwrap_err(),
            ScraperError::DateResolution(DateResolutionError::NoCandidate)
        );
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let xml = ARTICLE.replace("<article-title>", "<subtitle>").replace(
            "</article-title>",
            "</subtitle>",
        );

        assert!(matches!(
            paper_from_jats(&xml, RECORD, doi_links()),
            Err(ScraperError::MalformedRecord(_))
        ));
    }
}
