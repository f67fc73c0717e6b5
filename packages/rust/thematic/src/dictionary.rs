//! Keyword dictionaries and the pure scoring functions built on them.
//!
//! Matching is plain substring counting, not tokenization: Japanese article
//! text has no word boundaries, and compounds such as `商店街` should count
//! wherever they appear.

use std::collections::HashSet;

use ekimae_shared::{SeasonalFlag, WeightedTag};

/// Weight given to profile-mandated tags.
pub const MANDATORY_WEIGHT: u32 = 10;
/// Minimum total keyword hits for a dictionary tag to be kept.
pub const MIN_OCCURRENCES: usize = 2;
/// Cap on the weight of a dictionary tag.
pub const MAX_WEIGHT: u32 = 5;

/// A thematic tag and the keywords that evidence it.
#[derive(Debug, Clone, Copy)]
pub struct ThemeEntry {
    pub tag: &'static str,
    pub keywords: &'static [&'static str],
}

/// The thematic dictionary used for station articles.
pub const THEMES: &[ThemeEntry] = &[
    ThemeEntry { tag: "shopping", keywords: &["商店街", "百貨店", "デパート", "ショッピング", "商業施設"] },
    ThemeEntry { tag: "gourmet", keywords: &["飲食店", "グルメ", "ラーメン", "寿司", "居酒屋", "料理"] },
    ThemeEntry { tag: "history", keywords: &["歴史", "江戸", "明治", "史跡", "城跡", "宿場"] },
    ThemeEntry { tag: "temples_shrines", keywords: &["神社", "寺院", "仏閣", "参道", "寺"] },
    ThemeEntry { tag: "parks_nature", keywords: &["公園", "庭園", "緑地", "自然", "池"] },
    ThemeEntry { tag: "art_museums", keywords: &["美術館", "博物館", "ギャラリー", "アート"] },
    ThemeEntry { tag: "nightlife", keywords: &["繁華街", "歓楽街", "ナイトライフ", "バー", "クラブ"] },
    ThemeEntry { tag: "business", keywords: &["オフィス", "ビジネス", "本社", "金融", "官庁"] },
    ThemeEntry { tag: "subculture", keywords: &["アニメ", "漫画", "サブカルチャー", "オタク", "コスプレ"] },
    ThemeEntry { tag: "fashion", keywords: &["ファッション", "ブランド", "アパレル", "ブティック"] },
    ThemeEntry { tag: "entertainment", keywords: &["劇場", "映画館", "ライブ", "エンターテインメント", "ホール"] },
    ThemeEntry { tag: "retro_shitamachi", keywords: &["下町", "レトロ", "昭和", "横丁", "路地"] },
    ThemeEntry { tag: "waterfront", keywords: &["運河", "ベイエリア", "水辺", "河川", "湾岸"] },
    ThemeEntry { tag: "students", keywords: &["大学", "学生", "キャンパス", "学園"] },
    ThemeEntry { tag: "electronics", keywords: &["電気街", "家電", "電子部品", "パソコン"] },
    ThemeEntry { tag: "residential", keywords: &["住宅街", "住宅地", "閑静", "マンション"] },
    ThemeEntry { tag: "sports", keywords: &["スタジアム", "競技場", "野球", "スポーツ", "ドーム"] },
    ThemeEntry { tag: "transit_hub", keywords: &["ターミナル", "乗り換え", "乗換", "新幹線", "空港"] },
];

/// Keywords whose presence in article text raises a seasonal flag.
pub fn seasonal_text_keywords(flag: SeasonalFlag) -> &'static [&'static str] {
    match flag {
        SeasonalFlag::Sakura => &["桜", "さくら", "サクラ", "花見"],
        SeasonalFlag::Koyo => &["紅葉", "もみじ", "黄葉", "銀杏並木", "イチョウ並木"],
        SeasonalFlag::Ajisai => &["紫陽花", "あじさい", "アジサイ"],
        // Bare 梅 also appears in place names, so only compounds count.
        SeasonalFlag::Ume => &["梅林", "梅園", "梅まつり", "梅祭り", "観梅"],
    }
}

/// Non-overlapping occurrences of `needle` in `text`.
pub fn count_occurrences(text: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    text.matches(needle).count()
}

/// Seasonal flags whose keyword set has at least one hit in `text`.
pub fn detect_seasonal_flags(text: &str) -> Vec<SeasonalFlag> {
    SeasonalFlag::ALL
        .into_iter()
        .filter(|flag| seasonal_text_keywords(*flag).iter().any(|kw| text.contains(kw)))
        .collect()
}

/// Weighted tags for `text`.
///
/// `mandatory` tags come first with [`MANDATORY_WEIGHT`]. Each dictionary tag
/// follows, in dictionary order, when its keywords occur at least
/// [`MIN_OCCURRENCES`] times in total; its weight is the count capped at
/// [`MAX_WEIGHT`]. A tag never appears twice.
pub fn extract_tags(text: &str, dictionary: &[ThemeEntry], mandatory: &[String]) -> Vec<WeightedTag> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tags = Vec::new();

    for tag in mandatory {
        if !tag.is_empty() && seen.insert(tag.as_str()) {
            tags.push(WeightedTag::new(tag.as_str(), MANDATORY_WEIGHT));
        }
    }

    for entry in dictionary {
        if seen.contains(entry.tag) {
            continue;
        }
        let count: usize = entry
            .keywords
            .iter()
            .map(|kw| count_occurrences(text, kw))
            .sum();
        if count >= MIN_OCCURRENCES {
            seen.insert(entry.tag);
            let weight = u32::try_from(count).unwrap_or(u32::MAX).min(MAX_WEIGHT);
            tags.push(WeightedTag::new(entry.tag, weight));
        }
    }

    tags
}
