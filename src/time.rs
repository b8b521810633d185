//! Zip entry timestamps
//!
//! Zip headers store the last modification time as an MS-DOS date and time:
//! local wall-clock time, no time zone, 2-second resolution, and years from
//! 1980 through 2107. [`ZipDateTime`] is the validated, broken down form
//! callers work with and [`DosDateTime`] is the packed form that lands in the
//! headers.
//!
//! Converting a [`ZipDateTime`] outside the representable range clamps the
//! whole timestamp to the nearest boundary instead of only the year, so a
//! date in 1975 becomes 1980-01-01 00:00:00 and a date in 2200 becomes
//! 2107-12-31 23:59:58.
//!
//! ```
//! use zipcodec::time::{DosDateTime, ZipDateTime};
//!
//! let modified = ZipDateTime::from_components(2023, 6, 15, 14, 30, 45).unwrap();
//! let dos = DosDateTime::from(&modified);
//! assert_eq!(ZipDateTime::from_dos(dos).to_string(), "2023-06-15T14:30:44");
//! ```

const DOS_MIN_YEAR: u16 = 1980;
const DOS_MAX_YEAR: u16 = 2107;

/// A calendar date and wall-clock time with second resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZipDateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Default for ZipDateTime {
    /// The earliest MS-DOS timestamp, 1980-01-01 00:00:00
    fn default() -> Self {
        ZipDateTime {
            year: DOS_MIN_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl std::fmt::Display for ZipDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ISO 8601 without an offset, since Zip timestamps are local time
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl ZipDateTime {
    /// Creates a timestamp from its components.
    ///
    /// Returns `None` if any component is out of range or the date does not
    /// exist (e.g. February 30th). Years outside of the MS-DOS range are
    /// accepted here and clamped when converted to a [`DosDateTime`].
    ///
    /// ```
    /// # use zipcodec::time::ZipDateTime;
    /// assert!(ZipDateTime::from_components(2024, 2, 29, 0, 0, 0).is_some());
    /// assert!(ZipDateTime::from_components(2023, 2, 29, 0, 0, 0).is_none());
    /// ```
    pub fn from_components(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        if year == 0
            || month == 0
            || month > 12
            || day == 0
            || day > last_day_of_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }

        Some(ZipDateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Creates a timestamp from seconds since the Unix epoch, treating the
    /// epoch as local midnight. Values beyond year 1 or year 9999 saturate.
    pub fn from_unix(seconds: i64) -> Self {
        const MIN: i64 = -62_135_596_800; // 0001-01-01T00:00:00
        const MAX: i64 = 253_402_300_799; // 9999-12-31T23:59:59
        let seconds = seconds.clamp(MIN, MAX);

        let days = seconds.div_euclid(86_400);
        let seconds_in_day = seconds.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        ZipDateTime {
            year,
            month,
            day,
            hour: (seconds_in_day / 3600) as u8,
            minute: ((seconds_in_day % 3600) / 60) as u8,
            second: (seconds_in_day % 60) as u8,
        }
    }

    /// Creates a timestamp from a `SystemTime`, e.g. a file's modification
    /// time, with the same local-as-epoch interpretation as [`Self::from_unix`].
    pub fn from_system_time(time: std::time::SystemTime) -> Self {
        let seconds = match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_secs())
                .map(|x| -x)
                .unwrap_or(i64::MIN),
        };
        Self::from_unix(seconds)
    }

    /// Expands a packed MS-DOS timestamp. Out of range fields (month 0, day
    /// 31 in a 30 day month, hour 31, ...) are clamped.
    pub fn from_dos(dos: DosDateTime) -> Self {
        ZipDateTime {
            year: dos.year(),
            month: dos.month(),
            day: dos.day(),
            hour: dos.hour(),
            minute: dos.minute(),
            second: dos.second(),
        }
    }

    /// Seconds since the Unix epoch
    #[must_use]
    pub fn to_unix(&self) -> i64 {
        days_from_civil(self.year, self.month, self.day) * 86_400
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }

    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Month of the year (1-12)
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Day of the month (1-31)
    #[must_use]
    pub const fn day(&self) -> u8 {
        self.day
    }

    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    #[must_use]
    pub const fn second(&self) -> u8 {
        self.second
    }
}

/// An MS-DOS timestamp packed into a 16-bit time and a 16-bit date.
///
/// Bit layout of the date: 15-9 years since 1980, 8-5 month, 4-0 day.
/// Bit layout of the time: 15-11 hour, 10-5 minute, 4-0 seconds / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    time: u16,
    date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00
    pub const MIN: DosDateTime = DosDateTime::new(0, (1 << 5) | 1);

    /// 2107-12-31 23:59:58
    pub const MAX: DosDateTime = DosDateTime::new(
        (23 << 11) | (59 << 5) | 29,
        ((DOS_MAX_YEAR - DOS_MIN_YEAR) << 9) | (12 << 5) | 31,
    );

    /// Wraps the packed time and date exactly as they appear in a header
    #[must_use]
    pub const fn new(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    /// Returns the year (1980-2107)
    #[must_use]
    pub fn year(&self) -> u16 {
        ((self.date >> 9) & 0x7f) + DOS_MIN_YEAR
    }

    /// Returns the month (1-12)
    #[must_use]
    pub fn month(&self) -> u8 {
        let raw_month = ((self.date >> 5) & 0x0f) as u8;
        raw_month.clamp(1, 12)
    }

    /// Returns the day of the month, clamped to the days in that month
    #[must_use]
    pub fn day(&self) -> u8 {
        let raw_day = (self.date & 0x1f) as u8;
        raw_day.clamp(1, last_day_of_month(self.year(), self.month()))
    }

    #[must_use]
    pub fn hour(&self) -> u8 {
        let raw_hour = ((self.time >> 11) & 0x1f) as u8;
        raw_hour.min(23)
    }

    #[must_use]
    pub fn minute(&self) -> u8 {
        let raw_minute = ((self.time >> 5) & 0x3f) as u8;
        raw_minute.min(59)
    }

    /// Returns the second (0-58, always even)
    #[must_use]
    pub fn second(&self) -> u8 {
        let raw_second = ((self.time & 0x1f) * 2) as u8;
        raw_second.min(58)
    }

    /// Returns the packed (time, date) pair
    #[must_use]
    pub const fn into_parts(self) -> (u16, u16) {
        (self.time, self.date)
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        DosDateTime::MIN
    }
}

impl From<&ZipDateTime> for DosDateTime {
    fn from(dt: &ZipDateTime) -> Self {
        if dt.year < DOS_MIN_YEAR {
            return DosDateTime::MIN;
        } else if dt.year > DOS_MAX_YEAR {
            return DosDateTime::MAX;
        }

        let date = ((dt.year - DOS_MIN_YEAR) << 9) | (u16::from(dt.month) << 5) | u16::from(dt.day);
        let time =
            (u16::from(dt.hour) << 11) | (u16::from(dt.minute) << 5) | (u16::from(dt.second) / 2);
        DosDateTime { time, date }
    }
}

impl From<ZipDateTime> for DosDateTime {
    fn from(dt: ZipDateTime) -> Self {
        DosDateTime::from(&dt)
    }
}

/// Days since 1970-01-01 of a civil date.
///
/// Howard Hinnant's `days_from_civil`:
/// <https://howardhinnant.github.io/date_algorithms.html#days_from_civil>
fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let y = i64::from(year) - i64::from(month <= 2);
    let m = i64::from(month);
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`]
fn civil_from_days(days: i64) -> (u16, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as u16, month as u8, day as u8)
}

const fn is_leap(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

const fn last_day_of_month(year: u16, month: u8) -> u8 {
    const DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap(year) {
        29
    } else {
        DAYS[(month as usize).saturating_sub(1) % 12]
    }
}
