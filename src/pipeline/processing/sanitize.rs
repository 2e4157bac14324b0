//! Venue and address text cleanup.
//!
//! Everything here only ever deletes text. When a venue string turns out to
//! be nothing but a room or a placeholder, the result is empty rather than a
//! guess.

use regex::Regex;

use super::normalize::digits::normalize_text;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedVenue {
    /// Facility name, empty when the input named no facility.
    pub name: String,
    /// Address found inside a parenthetical, e.g. `児童館(中央町1-2-3)`.
    pub embedded_address: Option<String>,
}

impl SanitizedVenue {
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

pub struct VenueAddressSanitizer {
    bracket_label: Regex,
    field_label: Regex,
    decoration: Regex,
    parenthetical: Regex,
    floor_suffix: Regex,
    room_label: Regex,
    trailing_padding: Regex,
    placeholder: Regex,
    address_shape: Regex,
    phone: Regex,
    postal_code: Regex,
    address_label: Regex,
    contact_tail: Regex,
}

impl Default for VenueAddressSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid sanitizer pattern {pattern}: {e}"))
}

impl VenueAddressSanitizer {
    pub fn new() -> Self {
        Self {
            bracket_label: compile(r"【[^】]*】|\[[^\]]*\]"),
            field_label: compile(r"^(?:(?:開催|実施)?(?:会場|場所)|ところ)\s*(?::|\s)\s*"),
            decoration: compile(r"^[■□◆◇●○◎★☆※・▼▽▶►〇\-\s]+"),
            parenthetical: compile(r"\(([^()]*)\)"),
            floor_suffix: compile(r"\s*(?:地下\s*\d*\s*階|B\d+F|\d+\s*(?:階|F)).*$"),
            room_label: compile(
                r"^(?:第?\d+)?(?:大|中|小)?(?:会議室|研修室|和室|洋室|多目的室|多目的ホール|集会室|調理室|実習室|視聴覚室|講義室|工作室|創作室|体育室|遊戯室|ホール|講堂|ギャラリー|展示室|ロビー|談話室)[A-Za-z0-9]*$",
            ),
            trailing_padding: compile(r"\s*(?:ほか|他|など|等|にて|で開催)$"),
            placeholder: compile(
                r"(?i)^(?:未定|調整中|オンライン|web|zoom|市内各所|各会場|各施設|各地区|市内|町内|区内|自宅|ご自宅|その他|なし|-)$",
            ),
            address_shape: compile(r"〒|\d+\s*(?:丁目|番地|番|号)|\d+-\d+|[都道府県市区町村].*\d"),
            phone: compile(r"(?i)tel|電話|℡|fax|^\s*\d{2,4}-\d{2,4}-\d{4}\s*$"),
            postal_code: compile(r"(?:〒\s*|^)\d{3}-\d{4}"),
            address_label: compile(r"^(?:住所|所在地|会場住所)\s*:?\s*"),
            contact_tail: compile(r"(?i)\s*(?:tel|電話|℡|fax).*$"),
        }
    }

    /// Clean venue text and pull out any address embedded in parentheses.
    pub fn sanitize_venue(&self, text: &str) -> SanitizedVenue {
        let mut s = normalize_text(text);
        s = self.bracket_label.replace_all(&s, " ").into_owned();
        s = last_breadcrumb(&s).to_string();
        s = self.strip_leading(&s);

        let embedded_address = self
            .parenthetical
            .captures_iter(&s)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|inner| self.looks_like_address(inner))
            .map(|inner| self.sanitize_address(inner))
            .filter(|a| !a.is_empty());
        s = self.parenthetical.replace_all(&s, " ").into_owned();

        s = self.floor_suffix.replace(&s, "").into_owned();
        s = self.drop_trailing_rooms(&s);
        s = self.trailing_padding.replace(s.trim(), "").into_owned();
        let name = collapse(&s);

        let name = if self.is_non_facility(&name) { String::new() } else { name };
        SanitizedVenue { name, embedded_address }
    }

    /// Clean raw address text: postal codes, field labels, contact details
    /// and parenthetical asides are removed.
    pub fn sanitize_address(&self, text: &str) -> String {
        let mut s = normalize_text(text);
        s = self.contact_tail.replace(&s, "").into_owned();
        s = self.postal_code.replace_all(&s, " ").into_owned();
        s = self.strip_leading(&s);
        s = self.address_label.replace(s.trim(), "").into_owned();
        s = self.parenthetical.replace_all(&s, " ").into_owned();
        collapse(&s)
    }

    /// Whether a fragment reads like a street address rather than an aside.
    pub fn looks_like_address(&self, text: &str) -> bool {
        !self.phone.is_match(text) && self.address_shape.is_match(text)
    }

    fn strip_leading(&self, s: &str) -> String {
        let s = self.decoration.replace(s.trim(), "");
        let s = self.field_label.replace(&s, "");
        self.decoration.replace(&s, "").into_owned()
    }

    fn drop_trailing_rooms(&self, s: &str) -> String {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        while tokens.len() > 1 && tokens.last().is_some_and(|t| self.room_label.is_match(t)) {
            tokens.pop();
        }
        tokens.join(" ")
    }

    fn is_non_facility(&self, name: &str) -> bool {
        name.is_empty() || self.room_label.is_match(name) || self.placeholder.is_match(name)
    }
}

fn last_breadcrumb(s: &str) -> &str {
    s.rsplit(['>', '»', '›'])
        .map(str::trim)
        .find(|seg| !seg.is_empty())
        .unwrap_or("")
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue(text: &str) -> SanitizedVenue {
        VenueAddressSanitizer::new().sanitize_venue(text)
    }

    #[test]
    fn test_embedded_address_is_extracted() {
        let v = venue("児童館（市内中央町1-2-3）");
        assert_eq!(v.name, "児童館");
        assert_eq!(v.embedded_address.as_deref(), Some("市内中央町1-2-3"));
    }

    #[test]
    fn test_floor_and_room_suffixes() {
        assert_eq!(venue("会場：中央公民館 2階 第1会議室").name, "中央公民館");
        assert_eq!(venue("市民センター3F").name, "市民センター");
        assert_eq!(venue("市民文化会館 大ホール").name, "市民文化会館");
    }

    #[test]
    fn test_breadcrumbs_and_padding() {
        assert_eq!(venue("ホーム > 施設案内 > 市民文化会館").name, "市民文化会館");
        assert_eq!(venue("【会場】◎市民体育館ほか").name, "市民体育館");
        assert_eq!(venue("■ 場所 中央図書館にて").name, "中央図書館");
    }

    #[test]
    fn test_room_only_and_placeholders_are_rejected() {
        assert_eq!(venue("会議室").name, "");
        assert_eq!(venue("第2研修室").name, "");
        assert_eq!(venue("3階 会議室").name, "");
        assert_eq!(venue("未定").name, "");
        assert_eq!(venue("オンライン（Zoom）").name, "");
        assert!(!venue("").has_name());
    }

    #[test]
    fn test_non_address_parentheticals_are_dropped() {
        let v = venue("中央図書館（TEL 03-1234-5678）");
        assert_eq!(v.name, "中央図書館");
        assert_eq!(v.embedded_address, None);

        let v = venue("市民プール（屋内）");
        assert_eq!(v.name, "市民プール");
        assert_eq!(v.embedded_address, None);
    }

    #[test]
    fn test_address_cleanup() {
        let s = VenueAddressSanitizer::new();
        assert_eq!(
            s.sanitize_address("〒123-4567 東京都X市中央1-2-3 TEL:03-1234-5678"),
            "東京都X市中央1-2-3"
        );
        assert_eq!(s.sanitize_address("所在地：中央町２丁目５番（駅前）"), "中央町2丁目5番");
        assert_eq!(s.sanitize_address("   "), "");
    }

    #[test]
    fn test_output_is_drawn_from_input() {
        let input = "【会場】市民会館 2階 和室（中央町1-1）";
        let v = venue(input);
        let normalized = normalize_text(input);
        assert!(normalized.contains(&v.name));
        assert!(normalized.contains(v.embedded_address.as_deref().unwrap()));
    }
}
