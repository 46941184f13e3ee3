/// Characters dropped from register labels before they are used as keys.
const STRIPPED: &[char] = &['+', '\\', '&', '*', '%', '$', '#', '@', '!'];

/// Maps a device-reported register label to a stable, topic-safe identifier.
///
/// `"Solar Panel #1"` becomes `"solar_panel_1"` and `"Solar+Panel"` becomes `"solarpanel"`.
pub fn fix_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !STRIPPED.contains(c)).collect();

    let mut out = String::with_capacity(stripped.len());
    let mut in_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }

    // Whitespace is already gone, so the trim leaves leading and trailing `_` in place.
    let mut out = out.trim().to_lowercase();
    while out.contains("__") {
        out = out.replace("__", "_");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_name_strips_punctuation() {
        assert_eq!(fix_name("Solar+Panel #1"), "solarpanel_1");
        assert_eq!(fix_name("Solar Panel #1"), "solar_panel_1");
        assert_eq!(fix_name("A&B*C%D$E@F!G\\H"), "abcdefgh");
    }

    #[test]
    fn test_fix_name_whitespace() {
        assert_eq!(fix_name("  Grid  Import "), "_grid_import_");
        assert_eq!(fix_name(" Dryer"), "_dryer");
        assert_eq!(fix_name("Hot\tWater\nTank"), "hot_water_tank");
    }

    #[test]
    fn test_fix_name_collapses_underscores() {
        assert_eq!(fix_name("Grid__Total"), "grid_total");
        assert_eq!(fix_name("Grid _ Total"), "grid_total");
        assert_eq!(fix_name("a____b"), "a_b");
    }

    #[test]
    fn test_fix_name_is_idempotent() {
        for raw in [
            "Solar+Panel #1",
            "  Dryer ",
            "EV   Charger (L2)",
            "Grid__Total",
            "",
            "###",
        ] {
            let once = fix_name(raw);
            assert_eq!(fix_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_fix_name_empty() {
        assert_eq!(fix_name(""), "");
        assert_eq!(fix_name("!!!"), "");
    }
}
