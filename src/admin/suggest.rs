//! Secondary (Hindi) name suggestions for new dishes

/// Common dish names and words, English to Hindi
const DICTIONARY: &[(&str, &str)] = &[
    ("butter chicken", "बटर चिकन"),
    ("dal makhani", "दाल मखनी"),
    ("dal", "दाल"),
    ("tandoor chicken", "तंदूरी चिकन"),
    ("tandoori chicken", "तंदूरी चिकन"),
    ("paneer tikka", "पनीर तिक्का"),
    ("paneer", "पनीर"),
    ("rajasthani thali", "राजस्थानी थाली"),
    ("thali", "थाली"),
    ("chicken curry", "चिकन करी"),
    ("chicken", "चिकन"),
    ("curry", "करी"),
    ("palak paneer", "पालक पनीर"),
    ("palak", "पालक"),
    ("roti", "रोटी"),
    ("naan", "नान"),
    ("biryani", "बिरयानी"),
    ("rice", "चावल"),
    ("lassi", "लस्सी"),
    ("samosa", "समोसा"),
    ("chole bhature", "छोले भटूरे"),
    ("chole", "छोले"),
    ("masala chai", "मसाला चाय"),
    ("chai", "चाय"),
    ("masala", "मसाला"),
    ("aloo", "आलू"),
    ("gobi", "गोभी"),
    ("jeera", "जीरा"),
    ("mutton", "मटन"),
    ("fish", "मछली"),
    ("prawn", "झींगा"),
];

fn lookup(key: &str) -> Option<&'static str> {
    DICTIONARY
        .iter()
        .find(|(english, _)| *english == key)
        .map(|(_, hindi)| *hindi)
}

/// Suggest a secondary name for `primary`
///
/// Whole-phrase matches win. Otherwise each known word is replaced and
/// unknown words are kept as typed; `None` when no word is known.
pub fn suggest_secondary_name(primary: &str) -> Option<String> {
    let phrase = primary.trim().to_lowercase();
    if phrase.is_empty() {
        return None;
    }

    if let Some(hindi) = lookup(&phrase) {
        return Some(hindi.to_string());
    }

    let mut any_known = false;
    let words: Vec<&str> = phrase
        .split_whitespace()
        .map(|word| match lookup(word) {
            Some(hindi) => {
                any_known = true;
                hindi
            }
            None => word,
        })
        .collect();

    any_known.then(|| words.join(" "))
}
