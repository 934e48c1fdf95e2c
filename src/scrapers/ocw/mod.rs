// MIT OpenCourseWare lecture notes and readings

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::html::{links, main_content_text};
use super::http::{HttpClient, HttpClientConfig, validate_url};
use super::{Scraper, limit_reached};
use crate::config::ScraperConfig;
use crate::corpus::{DifficultyLevel, Document, FocusArea, word_count};

const REQUEST_INTERVAL: Duration = Duration::from_secs(1);
const MAX_LECTURES: usize = 20;
const MAX_READINGS: usize = 10;
const MIN_WORDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub url: String,
    pub code: String,
    pub name: String,
    pub focus: FocusArea,
    pub priority: Priority,
}

impl Course {
    #[inline]
    pub fn new(url: &str, code: &str, name: &str, focus: FocusArea, priority: Priority) -> Self {
        Self {
            url: url.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            focus,
            priority,
        }
    }
}

/// Materials science, solid state, quantum, computational and statistical
/// mechanics courses, plus Applied Superconductivity
#[inline]
pub fn default_courses() -> Vec<Course> {
    use FocusArea::{Main, SubFocus};
    use Priority::{Critical, High, Low, Medium};

    [
        ("https://ocw.mit.edu/courses/3-091sc-introduction-to-solid-state-chemistry-fall-2010/", "3.091SC", "Introduction to Solid State Chemistry", Main, High),
        ("https://ocw.mit.edu/courses/3-012-fundamentals-of-materials-science-fall-2005/", "3.012", "Fundamentals of Materials Science", Main, High),
        ("https://ocw.mit.edu/courses/3-22-mechanical-behavior-of-materials-spring-2008/", "3.22", "Mechanical Behavior of Materials", Main, Medium),
        ("https://ocw.mit.edu/courses/3-014-materials-laboratory-fall-2006/", "3.014", "Materials Laboratory", Main, Medium),
        ("https://ocw.mit.edu/courses/3-021j-introduction-to-modeling-and-simulation-spring-2012/", "3.021J", "Introduction to Modeling and Simulation", SubFocus, High),
        ("https://ocw.mit.edu/courses/8-231-physics-of-solids-i-fall-2006/", "8.231", "Physics of Solids I", Main, High),
        ("https://ocw.mit.edu/courses/8-232-physics-of-solids-ii-spring-2007/", "8.232", "Physics of Solids II", Main, High),
        ("https://ocw.mit.edu/courses/8-512-theory-of-solids-ii-spring-2009/", "8.512", "Theory of Solids II", Main, High),
        ("https://ocw.mit.edu/courses/8-514-many-body-theory-for-condensed-matter-systems-fall-2004/", "8.514", "Many-Body Theory for Condensed Matter Systems", Main, Medium),
        ("https://ocw.mit.edu/courses/8-04-quantum-physics-i-spring-2016/", "8.04", "Quantum Physics I", Main, Medium),
        ("https://ocw.mit.edu/courses/8-05-quantum-physics-ii-fall-2013/", "8.05", "Quantum Physics II", Main, Medium),
        ("https://ocw.mit.edu/courses/8-06-quantum-physics-iii-spring-2018/", "8.06", "Quantum Physics III", Main, Low),
        ("https://ocw.mit.edu/courses/3-320-atomistic-computer-modeling-of-materials-sma-5107-spring-2005/", "3.320", "Atomistic Computer Modeling of Materials", SubFocus, High),
        ("https://ocw.mit.edu/courses/8-333-statistical-mechanics-i-statistical-mechanics-of-particles-fall-2013/", "8.333", "Statistical Mechanics I", Main, Medium),
        ("https://ocw.mit.edu/courses/8-334-statistical-mechanics-ii-statistical-physics-of-fields-spring-2014/", "8.334", "Statistical Mechanics II", Main, Low),
        ("https://ocw.mit.edu/courses/6-763-applied-superconductivity-fall-2005/", "6.763", "Applied Superconductivity", Main, Critical),
    ]
    .into_iter()
    .map(|(url, code, name, focus, priority)| Course::new(url, code, name, focus, priority))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Lecture,
    Reading,
    Assignment,
    Exam,
}

/// Classify a course page link by its anchor text
#[inline]
pub fn classify_link(anchor_text: &str) -> Option<LinkKind> {
    let text = anchor_text.to_lowercase();
    if text.contains("lecture") || text.contains("notes") {
        Some(LinkKind::Lecture)
    } else if text.contains("reading") {
        Some(LinkKind::Reading)
    } else if text.contains("assignment") || text.contains("problem") || text.contains("pset") {
        Some(LinkKind::Assignment)
    } else if text.contains("exam") || text.contains("quiz") {
        Some(LinkKind::Exam)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLink {
    pub title: String,
    pub url: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseStructure {
    pub lectures: Vec<CourseLink>,
    pub readings: Vec<CourseLink>,
    pub assignments: Vec<CourseLink>,
    pub exams: Vec<CourseLink>,
}

impl CourseStructure {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lectures.is_empty() && self.readings.is_empty() && self.assignments.is_empty()
    }
}

/// Group the links of a course home page; a URL is kept once, under its first kind
#[inline]
pub fn parse_course_structure(html: &str, base: &Url) -> CourseStructure {
    let mut structure = CourseStructure::default();
    let mut seen = HashSet::new();

    for (title, url) in links(html, base) {
        let Some(kind) = classify_link(&title) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let link = CourseLink { title, url };
        match kind {
            LinkKind::Lecture => structure.lectures.push(link),
            LinkKind::Reading => structure.readings.push(link),
            LinkKind::Assignment => structure.assignments.push(link),
            LinkKind::Exam => structure.exams.push(link),
        }
    }
    structure
}

#[derive(Debug)]
pub struct OcwScraper {
    http: HttpClient,
    courses: Vec<Course>,
    limit: Option<usize>,
}

impl OcwScraper {
    #[inline]
    pub fn new(config: &ScraperConfig, limit: Option<usize>) -> Self {
        Self {
            http: HttpClient::new(HttpClientConfig::from_scraper(config, REQUEST_INTERVAL)),
            courses: default_courses(),
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_courses(mut self, courses: Vec<Course>) -> Self {
        self.courses = courses;
        self
    }

    async fn course_structure(&mut self, course: &Course) -> Result<CourseStructure> {
        let base = validate_url(&course.url)?;
        let html = self.http.get(base.as_str()).await?;
        Ok(parse_course_structure(&html, &base))
    }

    async fn page_text(&mut self, url: &Url) -> Option<String> {
        match self.http.get(url.as_str()).await {
            Ok(html) => main_content_text(&html),
            Err(e) => {
                debug!("Failed to fetch {}: {:#}", url, e);
                None
            }
        }
    }

    /// Fetch up to `max` pages of one kind; ids use the link's position in the course
    async fn scrape_links(
        &mut self,
        course: &Course,
        links: &[CourseLink],
        max: usize,
        kind: LinkKind,
        documents: &mut Vec<Document>,
    ) {
        for (idx, link) in links.iter().take(max).enumerate() {
            if limit_reached(documents.len(), self.limit) {
                return;
            }
            let Some(text) = self.page_text(&link.url).await else {
                continue;
            };
            let words = word_count(&text);
            if words < MIN_WORDS {
                debug!("Skipping {} ({} words)", link.url, words);
                continue;
            }

            let n = idx + 1;
            let (id, doc_type) = if kind == LinkKind::Reading {
                (format!("mit_ocw_{}_reading_{}", course.code, n), "reading")
            } else {
                (format!("mit_ocw_{}_{}", course.code, n), "lecture_notes")
            };
            documents.push(
                Document::new(
                    id,
                    "mit_ocw",
                    doc_type,
                    link.title.clone(),
                    link.url.to_string(),
                    text,
                    DifficultyLevel::ADVANCED,
                )
                .with_focus(course.focus)
                .with_extra("course_code", course.code.clone())
                .with_extra("course_name", course.name.clone())
                .with_extra("institution", "MIT"),
            );
        }
    }
}

#[async_trait]
impl Scraper for OcwScraper {
    fn name(&self) -> &'static str {
        "mit_ocw"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        let mut courses = self.courses.clone();
        courses.sort_by_key(|course| course.priority);
        let mut seen_codes = HashSet::new();
        courses.retain(|course| seen_codes.insert(course.code.clone()));
        progress.set_length(courses.len() as u64);

        let mut documents = Vec::new();
        for course in &courses {
            progress.inc(1);
            if limit_reached(documents.len(), self.limit) {
                break;
            }
            progress.set_message(format!("{} {}", course.code, course.name));

            let structure = match self.course_structure(course).await {
                Ok(structure) => structure,
                Err(e) => {
                    warn!("Could not read course {}: {:#}", course.code, e);
                    continue;
                }
            };
            info!(
                "{}: {} lectures, {} readings, {} assignments, {} exams",
                course.code,
                structure.lectures.len(),
                structure.readings.len(),
                structure.assignments.len(),
                structure.exams.len()
            );
            if structure.is_empty() {
                continue;
            }

            let before = documents.len();
            self.scrape_links(course, &structure.lectures, MAX_LECTURES, LinkKind::Lecture, &mut documents)
                .await;
            self.scrape_links(course, &structure.readings, MAX_READINGS, LinkKind::Reading, &mut documents)
                .await;
            debug!("{} yielded {} documents", course.code, documents.len() - before);
        }

        info!("MIT OCW: {} documents from {} courses", documents.len(), courses.len());
        Ok(documents)
    }
}
