//! End-to-end checks of classify → retrieve → render over a store fixture.

use wenwen_shared::renderer::{APOLOGY, NOT_FOUND_MARKER};
use wenwen_shared::{
    retrieve, Approval, CoverageStats, Intent, IntentClassifier, ResponseRenderer,
    RetrievalOptions, Store, StoreFeatures,
};

const CATEGORIES: [&str; 11] = [
    "餐飲美食", "停車場", "醫療保健", "購物", "教育培訓", "美容美髮",
    "生活服務", "休閒娛樂", "住宿", "宗教", "公共設施",
];

fn store(id: i64, name: &str, category: &str, tags: &[&str]) -> Store {
    Store {
        id,
        name: name.to_string(),
        category: category.to_string(),
        subcategory: None,
        address: Some(format!("文山區測試路{}號", id)),
        phone: None,
        business_hours: None,
        features: StoreFeatures {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        },
        is_trusted: false,
        has_discount: false,
        is_partner: false,
        rating: 4.0,
        approval: Approval::Approved,
    }
}

/// 280 approved stores over 11 categories: 16 trusted, 18 discount, 1 partner
fn district_catalogue() -> Vec<Store> {
    let mut stores: Vec<Store> = (0..280)
        .map(|i| {
            let category = CATEGORIES[i % CATEGORIES.len()];
            let mut s = store(i as i64 + 1, &format!("商家{:03}", i + 1), category, &[]);
            s.is_trusted = i < 16;
            s.has_discount = (100..118).contains(&i);
            s
        })
        .collect();
    stores[0].is_partner = true;

    // Unapproved rows never count
    let mut pending = store(999, "待審商家", "餐飲美食", &[]);
    pending.approval = Approval::Pending;
    pending.is_partner = true;
    stores.push(pending);
    stores
}

fn sample_catalogue() -> Vec<Store> {
    let mut partner = store(10, "文山合作餐廳", "餐飲美食", &["火鍋"]);
    partner.is_partner = true;
    partner.rating = 3.5;
    vec![
        store(1, "木柵牛肉麵", "餐飲美食", &["牛肉麵"]),
        store(2, "指南火鍋", "餐飲美食", &["火鍋"]),
        partner,
        store(3, "康健藥局", "醫療保健", &["藥局"]),
        store(4, "景美牙醫", "醫療保健", &["牙醫"]),
        store(5, "肯塔基美語", "教育培訓", &["美語", "補習班"]),
        store(6, "興隆停車場", "停車場", &["汽車"]),
        store(7, "萬芳髮廊", "美容美髮", &["髮廊"]),
        store(8, "政大書局", "購物", &["書店"]),
    ]
}

#[test]
fn test_coverage_counts_match_catalogue() {
    let stats = CoverageStats::from_stores(&district_catalogue());
    assert_eq!(
        stats,
        CoverageStats {
            total_stores: 280,
            trusted_stores: 16,
            discount_stores: 18,
            partner_stores: 1,
            category_count: 11,
        }
    );

    let text = ResponseRenderer::with_signature("高文文 v0.0.0").coverage(&stats);
    for needle in ["280", "16", "18", "11"] {
        assert!(text.contains(needle), "missing {needle} in {text}");
    }
}

#[test]
fn test_statistics_question_lists_no_stores() {
    let classifier = IntentClassifier::builtin().unwrap();
    let c = classifier.classify("你的商家資料有多少資料?").unwrap();
    assert_eq!(c.intent, Intent::CoverageStats);

    let catalogue = district_catalogue();
    let result = retrieve(&c, &catalogue, &RetrievalOptions::default());
    assert!(result.is_empty());
    assert!(!result.is_not_found());
}

#[test]
fn test_statistics_with_empty_catalogue() {
    let stats = CoverageStats::from_stores(&[]);
    assert_eq!(stats, CoverageStats::default());
    let text = ResponseRenderer::with_signature("sig").coverage(&stats);
    assert!(text.contains("共收錄 0 家商家"));
}

#[test]
fn test_recommendations_come_only_from_catalogue() {
    let classifier = IntentClassifier::builtin().unwrap();
    let renderer = ResponseRenderer::with_signature("高文文 v0.0.0");
    let catalogue = sample_catalogue();
    let known: Vec<&str> = catalogue.iter().map(|s| s.name.as_str()).collect();

    let queries = [
        "我想找藥局", "推薦餐廳", "想吃火鍋", "哪裡可以停車", "我想學英文",
        "我想剪頭髮", "附近有書店嗎", "肯塔基在哪", "合作商家有哪些", "想看牙醫",
        "好", "你是誰", "今天天氣如何", "嗯哼哈嘿", "想看電影",
    ];

    for query in queries {
        let c = classifier.classify(query).unwrap();
        let result = retrieve(&c, &catalogue, &RetrievalOptions::default());
        assert!(result.items.len() <= 3 || c.all_partners, "{query}: too many");
        for s in result.stores() {
            assert!(known.contains(&s.name.as_str()), "{query}: unknown store {}", s.name);
            assert!(s.is_approved());
        }
        let text = renderer.recommendation(&c, &result);
        for s in &catalogue {
            if text.contains(&s.name) {
                assert!(
                    result.stores().any(|r| r.id == s.id),
                    "{query}: reply names {} which was not retrieved",
                    s.name
                );
            }
        }
    }
}

#[test]
fn test_pharmacy_scenario() {
    let classifier = IntentClassifier::builtin().unwrap();
    let c = classifier.classify("我想找藥局").unwrap();
    let result = retrieve(&c, &sample_catalogue(), &RetrievalOptions::default());

    let names: Vec<&str> = result.stores().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["康健藥局"]);
}

#[test]
fn test_partner_is_listed_first() {
    let classifier = IntentClassifier::builtin().unwrap();
    let c = classifier.classify("晚餐想吃火鍋").unwrap();
    let result = retrieve(&c, &sample_catalogue(), &RetrievalOptions::default());

    assert_eq!(result.items[0].store.name, "文山合作餐廳");
    assert!(result.items[0].boosted);
    assert_eq!(result.items.len(), 2);
}

#[test]
fn test_not_found_reply_is_honest() {
    let classifier = IntentClassifier::builtin().unwrap();
    let catalogue = vec![store(1, "木柵牛肉麵", "餐飲美食", &["牛肉麵"])];
    let c = classifier.classify("我想找藥局").unwrap();
    let result = retrieve(&c, &catalogue, &RetrievalOptions::default());
    assert!(result.is_not_found());

    let text = ResponseRenderer::with_signature("高文文 v0.0.0").recommendation(&c, &result);
    assert!(text.contains(APOLOGY));
    assert!(text.contains(NOT_FOUND_MARKER));
    assert!(!text.contains("木柵牛肉麵"));
    assert!(text.ends_with("高文文 v0.0.0"));
}

#[test]
fn test_partner_serving_food_as_secondary_category_does_not_double_boost() {
    let classifier = IntentClassifier::builtin().unwrap();
    let mut catalogue = sample_catalogue();
    let mut market = store(11, "合作市場火鍋", "購物", &["火鍋料"]);
    market.is_partner = true;
    market.features.secondary_category = Some("餐飲美食".to_string());
    catalogue.push(market);

    let c = classifier.classify("晚餐想吃火鍋").unwrap();
    assert_eq!(c.intent, Intent::Food);
    let result = retrieve(&c, &catalogue, &RetrievalOptions::default());

    let boosted: Vec<&str> = result
        .items
        .iter()
        .filter(|i| i.boosted)
        .map(|i| i.store.name.as_str())
        .collect();
    assert_eq!(boosted.len(), 1, "boosted {boosted:?}");
    assert!(result.stores().any(|s| s.id == 11));
}
