use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Placeholder for a time that is unknown or unavailable.
pub const SENTINEL_TIME: &str = "--:--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
}

impl Location {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self { country: country.into(), city: city.into() }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrayerName {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Sunset,
    Maghrib,
    Isha,
}

impl PrayerName {
    pub const fn all() -> &'static [PrayerName] {
        &[
            PrayerName::Fajr,
            PrayerName::Sunrise,
            PrayerName::Dhuhr,
            PrayerName::Asr,
            PrayerName::Sunset,
            PrayerName::Maghrib,
            PrayerName::Isha,
        ]
    }

    /// The five obligatory prayers in daily order. Sunrise and Sunset are solar markers.
    pub const fn obligatory() -> &'static [PrayerName] {
        &[
            PrayerName::Fajr,
            PrayerName::Dhuhr,
            PrayerName::Asr,
            PrayerName::Maghrib,
            PrayerName::Isha,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Sunrise => "Sunrise",
            PrayerName::Dhuhr => "Dhuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Sunset => "Sunset",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
        }
    }

    pub fn label(&self, language: Language) -> &'static str {
        match language {
            Language::En => self.as_str(),
            Language::Tr => match self {
                PrayerName::Fajr => "İmsak",
                PrayerName::Sunrise => "Güneş",
                PrayerName::Dhuhr => "Öğle",
                PrayerName::Asr => "İkindi",
                PrayerName::Sunset => "Gün batımı",
                PrayerName::Maghrib => "Akşam",
                PrayerName::Isha => "Yatsı",
            },
        }
    }
}

impl std::fmt::Display for PrayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display language for prayer names and status texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Tr,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Tr => "tr",
        }
    }

    pub const fn all() -> &'static [Language] {
        &[Language::En, Language::Tr]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Language {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "tr" => Ok(Language::Tr),
            _ => Err(anyhow::anyhow!("Unknown language '{value}'. Supported languages: en, tr.")),
        }
    }
}

/// Clock times (`HH:MM`) for one day, keyed by prayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Timings {
    pub fajr: String,
    pub sunrise: String,
    pub dhuhr: String,
    pub asr: String,
    pub sunset: String,
    pub maghrib: String,
    pub isha: String,
}

impl Timings {
    pub fn unknown() -> Self {
        let s = || SENTINEL_TIME.to_string();
        Self {
            fajr: s(),
            sunrise: s(),
            dhuhr: s(),
            asr: s(),
            sunset: s(),
            maghrib: s(),
            isha: s(),
        }
    }

    pub fn get(&self, name: PrayerName) -> &str {
        match name {
            PrayerName::Fajr => &self.fajr,
            PrayerName::Sunrise => &self.sunrise,
            PrayerName::Dhuhr => &self.dhuhr,
            PrayerName::Asr => &self.asr,
            PrayerName::Sunset => &self.sunset,
            PrayerName::Maghrib => &self.maghrib,
            PrayerName::Isha => &self.isha,
        }
    }

    /// Parsed clock time, or `None` for the sentinel and malformed values.
    pub fn time_of(&self, name: PrayerName) -> Option<NaiveTime> {
        let raw = clean_time(self.get(name));
        if raw == SENTINEL_TIME {
            return None;
        }
        NaiveTime::parse_from_str(raw, "%H:%M").ok()
    }
}

/// Keeps only the part before the first space: `"05:32 (+03)"` becomes `"05:32"`.
pub fn clean_time(raw: &str) -> &str {
    raw.split(' ').next().map(str::trim).unwrap_or(raw)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInfo {
    pub timestamp: i64,
    pub date: NaiveDate,
    pub weekday: String,
}

impl DateInfo {
    pub fn for_day(date: NaiveDate, timestamp: i64) -> Self {
        Self { timestamp, date, weekday: weekday_name(date.weekday()).to_string() }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTimesResult {
    pub succeeded: bool,
    pub status_text: String,
    pub date: DateInfo,
    pub timings: Timings,
}

impl PrayerTimesResult {
    /// Renderable stand-in used whenever today's timings could not be resolved.
    pub fn placeholder(date: NaiveDate, timestamp: i64) -> Self {
        Self {
            succeeded: false,
            status_text: "Error".to_string(),
            date: DateInfo::for_day(date, timestamp),
            timings: Timings::unknown(),
        }
    }
}

/// The next obligatory prayer still ahead today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPrayer {
    pub name: PrayerName,
    pub time_of_day: String,
    pub remaining_ms: i64,
}
