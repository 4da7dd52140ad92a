/// Formats elapsed time as `HH:MM:SS`, or `HH:MM:SS:cc` with hundredths.
/// Hours keep growing past two digits instead of wrapping.
pub fn format_stopwatch(millis: i64, include_centis: bool) -> String {
    let millis = millis.max(0);

    let hours = millis / 3_600_000;
    let minutes = millis / 60_000 % 60;
    let seconds = millis / 1000 % 60;

    if include_centis {
        let centis = millis % 1000 / 10;
        format!("{hours:02}:{minutes:02}:{seconds:02}:{centis:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::format_stopwatch;

    #[test]
    fn zero() {
        assert_eq!(format_stopwatch(0, false), "00:00:00");
        assert_eq!(format_stopwatch(0, true), "00:00:00:00");
    }

    #[test]
    fn fields_are_zero_padded() {
        let millis = 3_600_000 + 2 * 60_000 + 3 * 1000 + 40;
        assert_eq!(format_stopwatch(millis, false), "01:02:03");
        assert_eq!(format_stopwatch(millis, true), "01:02:03:04");
    }

    #[test]
    fn centis_truncate() {
        assert_eq!(format_stopwatch(59_999, true), "00:00:59:99");
        assert_eq!(format_stopwatch(59_999, false), "00:00:59");
    }

    #[test]
    fn long_runs_and_negative_input() {
        assert_eq!(format_stopwatch(100 * 3_600_000, false), "100:00:00");
        assert_eq!(format_stopwatch(-5, false), "00:00:00");
    }
}
