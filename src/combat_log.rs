use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub(crate) const BANNER_SEPARATOR: &str =
    "------------------------------------------------------------";
const SESSION_STARTED_FORMAT: &str = "%Y.%m.%d %H:%M:%S";
const LOG_FILE_DATE_PREFIX_FORMAT: &str = "%Y%m%d";
const BANNER_SEARCH_LINE_LIMIT: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum CombatLogError {
    #[error("invalid combat log search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("combat log offsets were not marked before extraction")]
    OffsetsNotMarked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum LanguageCode {
    English = 0,
    French = 1,
    German = 2,
    Russian = 3,
    Japanese = 4,
    Korean = 5,
    Chinese = 6,
}

impl LanguageCode {
    pub fn label(self) -> &'static str {
        match self {
            LanguageCode::English => "ENGLISH",
            LanguageCode::French => "FRENCH",
            LanguageCode::German => "GERMAN",
            LanguageCode::Russian => "RUSSIAN",
            LanguageCode::Japanese => "JAPANESE",
            LanguageCode::Korean => "KOREAN",
            LanguageCode::Chinese => "CHINESE",
        }
    }
}

/// Banner labels of every supported game-client language. Adding a
/// language only needs a new row here.
pub(crate) struct LanguagePattern {
    pub(crate) language: LanguageCode,
    pub(crate) listener_label: &'static str,
    pub(crate) session_started_label: &'static str,
}

pub(crate) const LANGUAGE_PATTERNS: &[LanguagePattern] = &[
    LanguagePattern {
        language: LanguageCode::English,
        listener_label: "Listener",
        session_started_label: "Session Started",
    },
    LanguagePattern {
        language: LanguageCode::French,
        listener_label: "Auditeur",
        session_started_label: "Session commencée",
    },
    LanguagePattern {
        language: LanguageCode::German,
        listener_label: "Empfänger",
        session_started_label: "Sitzung gestartet",
    },
    LanguagePattern {
        language: LanguageCode::Russian,
        listener_label: "Слушатель",
        session_started_label: "Сеанс начат",
    },
    LanguagePattern {
        language: LanguageCode::Japanese,
        listener_label: "傍聴者",
        session_started_label: "セッション開始",
    },
    LanguagePattern {
        language: LanguageCode::Korean,
        listener_label: "청취자",
        session_started_label: "세션 시작됨",
    },
    LanguagePattern {
        language: LanguageCode::Chinese,
        listener_label: "收听者",
        session_started_label: "进程开始",
    },
];

struct LanguageMatcher {
    language: LanguageCode,
    listener: Regex,
    session_started: Regex,
}

lazy_static::lazy_static! {
    static ref LANGUAGE_MATCHERS: Vec<LanguageMatcher> = LANGUAGE_PATTERNS
        .iter()
        .filter_map(|pattern| {
            let listener = banner_field_regex(pattern.listener_label)?;
            let session_started = banner_field_regex(pattern.session_started_label)?;
            Some(LanguageMatcher {
                language: pattern.language,
                listener,
                session_started,
            })
        })
        .collect();
}

fn banner_field_regex(label: &str) -> Option<Regex> {
    let pattern = format!(r"^\s*{}:\s(.*)$", regex::escape(label));
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::error!(label, regex_error = %error, "Invalid combat log banner pattern");
            None
        }
    }
}

/// Combat log file selected for a character, with the client language
/// detected from its banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatLogFile {
    pub path: PathBuf,
    pub language: LanguageCode,
}

/// Lines a character's combat log gained during a recording session.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CombatLogRecord {
    #[prost(string, tag = "1")]
    pub character_name: String,
    #[prost(string, repeated, tag = "2")]
    pub combat_log_lines: Vec<String>,
    #[prost(enumeration = "LanguageCode", tag = "3")]
    pub language_code: i32,
}

impl CombatLogRecord {
    pub fn new(character_name: &str, language: LanguageCode, lines: Vec<String>) -> Self {
        Self {
            character_name: character_name.to_string(),
            combat_log_lines: lines,
            language_code: language as i32,
        }
    }

    /// Detected language; values written by newer encoders read as English.
    pub fn language(&self) -> LanguageCode {
        LanguageCode::try_from(self.language_code).unwrap_or(LanguageCode::English)
    }
}

#[derive(Debug)]
struct BannerIdentity {
    character: String,
    language: LanguageCode,
    session_started: NaiveDateTime,
}

pub struct CombatLogReader {
    log_directory: PathBuf,
    offset_marks: Option<BTreeMap<String, u64>>,
}

impl CombatLogReader {
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
            offset_marks: None,
        }
    }

    pub fn log_directory(&self) -> &Path {
        &self.log_directory
    }

    pub fn set_log_directory(&mut self, log_directory: impl Into<PathBuf>) {
        self.log_directory = log_directory.into();
    }

    /// Log files whose name starts with a UTC date touched by
    /// `[end - window, end]`, in glob order per day.
    pub fn discover_files(
        &self,
        end: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<PathBuf>, CombatLogError> {
        let escaped_directory = glob::Pattern::escape(&self.log_directory.to_string_lossy());
        let mut log_files: Vec<PathBuf> = Vec::new();

        for prefix in log_file_date_prefixes(end, window) {
            let pattern = Path::new(&escaped_directory)
                .join(format!("{prefix}*.txt"))
                .to_string_lossy()
                .to_string();

            for entry in glob::glob(&pattern)? {
                match entry {
                    Ok(path) => {
                        if !log_files.contains(&path) {
                            log_files.push(path);
                        }
                    }
                    Err(error) => {
                        tracing::debug!(glob_error = %error, "Skipping unreadable combat log entry");
                    }
                }
            }
        }

        Ok(log_files)
    }

    /// Maps listener names to their log file. When several files belong to
    /// the same character the one with the latest session start wins.
    pub fn classify(&self, files: &[PathBuf]) -> BTreeMap<String, CombatLogFile> {
        let mut latest_by_character: BTreeMap<String, (NaiveDateTime, CombatLogFile)> =
            BTreeMap::new();

        for path in files {
            let Some(identity) = read_banner_identity(path) else {
                continue;
            };

            let is_newer = latest_by_character
                .get(&identity.character)
                .map(|(session_started, _)| *session_started < identity.session_started)
                .unwrap_or(true);

            if is_newer {
                latest_by_character.insert(
                    identity.character,
                    (
                        identity.session_started,
                        CombatLogFile {
                            path: path.clone(),
                            language: identity.language,
                        },
                    ),
                );
            }
        }

        latest_by_character
            .into_iter()
            .map(|(character, (_, log_file))| (character, log_file))
            .collect()
    }

    /// Records the current size of every tracked character's log. Growth
    /// before this call is never captured.
    pub fn mark_offsets(&mut self, characters: &BTreeMap<String, CombatLogFile>) {
        if self.offset_marks.is_some() {
            tracing::warn!("Replacing combat log offset marks that were never extracted");
        }

        let mut marks = BTreeMap::new();
        for (character, log_file) in characters {
            match std::fs::metadata(&log_file.path) {
                Ok(metadata) => {
                    marks.insert(character.clone(), metadata.len());
                }
                Err(error) => {
                    tracing::warn!(
                        character = %character,
                        log_path = %log_file.path.display(),
                        io_error = %error,
                        "Failed to mark combat log offset"
                    );
                }
            }
        }

        self.offset_marks = Some(marks);
    }

    pub fn has_marked_offsets(&self) -> bool {
        self.offset_marks.is_some()
    }

    /// Drops marks without reading, for sessions that produced nothing.
    pub fn discard_offsets(&mut self) {
        self.offset_marks = None;
    }

    /// Reads every line appended since `mark_offsets`. Consumes the marks.
    pub fn extract_since(
        &mut self,
        characters: &BTreeMap<String, CombatLogFile>,
    ) -> Result<Vec<CombatLogRecord>, CombatLogError> {
        let marks = self
            .offset_marks
            .take()
            .ok_or(CombatLogError::OffsetsNotMarked)?;

        let mut records = Vec::new();
        for (character, log_file) in characters {
            let Some(offset) = marks.get(character).copied() else {
                continue;
            };

            match read_lines_from_offset(&log_file.path, offset) {
                Ok(lines) => {
                    tracing::debug!(
                        character = %character,
                        line_count = lines.len(),
                        "Extracted combat log delta"
                    );
                    records.push(CombatLogRecord::new(character, log_file.language, lines));
                }
                Err(error) => {
                    tracing::warn!(
                        character = %character,
                        log_path = %log_file.path.display(),
                        io_error = %error,
                        "Failed to read combat log delta"
                    );
                }
            }
        }

        Ok(records)
    }
}

pub(crate) fn log_file_date_prefixes(end: DateTime<Utc>, window: Duration) -> Vec<String> {
    let window = window.max(Duration::zero());
    let begin = end.checked_sub_signed(window).unwrap_or(end);
    let last_day = end.date_naive();

    let mut prefixes = Vec::new();
    let mut day: Option<NaiveDate> = Some(begin.date_naive());
    while let Some(current_day) = day {
        if current_day > last_day {
            break;
        }
        prefixes.push(current_day.format(LOG_FILE_DATE_PREFIX_FORMAT).to_string());
        day = current_day.succ_opt();
    }

    prefixes
}

fn read_banner_identity(path: &Path) -> Option<BannerIdentity> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            tracing::warn!(
                log_path = %path.display(),
                io_error = %error,
                "Failed to open combat log for classification"
            );
            return None;
        }
    };

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut inside_banner = false;
    let mut lines_before_banner = 0_usize;
    let mut character: Option<(String, LanguageCode)> = None;
    let mut session_started: Option<NaiveDateTime> = None;

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(
                    log_path = %path.display(),
                    io_error = %error,
                    "Failed to read combat log banner"
                );
                return None;
            }
        }

        let raw_line = String::from_utf8_lossy(&buffer);
        let line = trim_line_ending(&raw_line).trim_start_matches('\u{feff}');

        if line == BANNER_SEPARATOR {
            if inside_banner {
                return None;
            }
            inside_banner = true;
            continue;
        }

        if !inside_banner {
            lines_before_banner += 1;
            if lines_before_banner >= BANNER_SEARCH_LINE_LIMIT {
                return None;
            }
            continue;
        }

        for matcher in LANGUAGE_MATCHERS.iter() {
            if let Some(captures) = matcher.listener.captures(line) {
                character = Some((captures[1].trim().to_string(), matcher.language));
            }

            if let Some(captures) = matcher.session_started.captures(line) {
                if let Ok(started) =
                    NaiveDateTime::parse_from_str(captures[1].trim(), SESSION_STARTED_FORMAT)
                {
                    session_started = Some(started);
                }
            }
        }

        if let (Some((name, language)), Some(started)) = (&character, session_started) {
            return Some(BannerIdentity {
                character: name.clone(),
                language: *language,
                session_started: started,
            });
        }
    }
}

fn read_lines_from_offset(path: &Path, offset: u64) -> std::io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let file_length = file.metadata()?.len();

    let mut start_offset = offset;
    if file_length < start_offset {
        tracing::warn!(
            log_path = %path.display(),
            marked_offset = offset,
            file_length,
            "Combat log shrank since it was marked, reading from the beginning"
        );
        start_offset = 0;
    }

    file.seek(SeekFrom::Start(start_offset))?;

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut lines = Vec::new();

    loop {
        buffer.clear();
        let bytes_read = reader.read_until(b'\n', &mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        let raw_line = String::from_utf8_lossy(&buffer);
        lines.push(trim_line_ending(&raw_line).to_string());
    }

    Ok(lines)
}

fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
