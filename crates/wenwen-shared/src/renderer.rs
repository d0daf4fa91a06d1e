//! Reply templates.
//!
//! Store names only ever come from a [`RecommendationResult`]; the renderer
//! has no other source of stores. Every reply ends with the signature.

use crate::classifier::Classification;
use crate::intent::Intent;
use crate::retriever::{RecommendationResult, RecommendedStore};
use crate::store::CoverageStats;
use crate::version::VersionInfo;
use crate::{BOT_NAME, DISTRICT_NAME};

/// Apology phrase used by every not-found reply
pub const APOLOGY: &str = "抱歉";

/// Marker present in every not-found reply
pub const NOT_FOUND_MARKER: &str = "找不到";

/// Separator before the signature line
const FOOTER_RULE: &str = "\n\n---\n";

#[derive(Debug, Clone)]
pub struct ResponseRenderer {
    signature: String,
}

impl Default for ResponseRenderer {
    fn default() -> Self {
        Self::new(&VersionInfo::current())
    }
}

impl ResponseRenderer {
    pub fn new(version: &VersionInfo) -> Self {
        Self {
            signature: version.signature(),
        }
    }

    /// Override the signature line (config `chat.signature`)
    pub fn with_signature(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn finish(&self, body: String) -> String {
        format!("{}{}{}", body.trim_end(), FOOTER_RULE, self.signature)
    }

    /// Store recommendation, or an honest not-found reply
    pub fn recommendation(
        &self,
        classification: &Classification,
        result: &RecommendationResult,
    ) -> String {
        self.finish(recommendation_body(classification, result))
    }

    /// Two unrelated categories in one message, answered section by section
    pub fn mixed(
        &self,
        primary: (&Classification, &RecommendationResult),
        secondary: (&Classification, &RecommendationResult),
    ) -> String {
        let mut body = String::from("您的問題包含兩個不同的需求，我分開回答：\n\n");
        for (index, (classification, result)) in [primary, secondary].into_iter().enumerate() {
            body.push_str(&format!("【{}】{}\n", index + 1, subject(classification)));
            body.push_str(&recommendation_body(classification, result));
            body.push_str("\n\n");
        }
        self.finish(body)
    }

    /// Aggregate counts, rendered verbatim. Never lists stores.
    pub fn coverage(&self, stats: &CoverageStats) -> String {
        let body = format!(
            "目前{}資料庫共收錄 {} 家商家：\n\
             - 安心店家：{} 家\n\
             - 優惠店家：{} 家\n\
             - 合作商家：{} 家\n\
             - 涵蓋類別：{} 類\n\n\
             想找哪一類的店家，直接告訴我就可以囉！",
            DISTRICT_NAME,
            stats.total_stores,
            stats.trusted_stores,
            stats.discount_stores,
            stats.partner_stores,
            stats.category_count,
        );
        self.finish(body)
    }

    /// FAQ answer, verbatim
    pub fn faq(&self, answer: &str) -> String {
        self.finish(answer.trim().to_string())
    }

    /// Daily message limit reached
    pub fn daily_limit(&self) -> String {
        self.finish(
            "今天的對話次數已達上限，高文文需要休息一下。明天再來找我聊聊吧！".to_string(),
        )
    }

    /// Template replies for intents that never list stores
    pub fn conversational(&self, classification: &Classification) -> String {
        let body = match classification.intent {
            Intent::SelfIntro => format!(
                "我是{}，{}的在地小幫手！\n\
                 我可以幫您找美食、停車場、醫療院所、購物、美容美髮和英語學習等店家，\
                 也能回答特區的常見問題。想找什麼，直接問我就可以囉！",
                BOT_NAME, DISTRICT_NAME
            ),
            Intent::Directions => format!(
                "{}位於文山區，可搭乘捷運文湖線或多線公車抵達。\n\
                 如果您告訴我想去的店家名稱，我可以提供該店的地址給您導航。",
                DISTRICT_NAME
            ),
            Intent::Confirmation => "不客氣！還有其他需要，隨時告訴我喔。".to_string(),
            Intent::VagueChat => format!(
                "嗨，我是{}！想吃點什麼、找停車位，或是找附近的診所藥局都可以問我。",
                BOT_NAME
            ),
            Intent::OutOfScope => format!(
                "{}，這個問題超出我的服務範圍了。我專門提供{}的商家與生活資訊，\
                 例如美食、停車、醫療和購物，歡迎改問這些喔！",
                APOLOGY, DISTRICT_NAME
            ),
            _ => format!(
                "我還不太確定您想找什麼。可以說得更具體一點嗎？\n\
                 例如：「附近有什麼好吃的」、「我想找藥局」、「哪裡可以停車」。\n\
                 我是{}，專門介紹{}的店家。",
                BOT_NAME, DISTRICT_NAME
            ),
        };
        self.finish(body)
    }
}

/// What the user asked for, in words
fn subject(classification: &Classification) -> String {
    match (classification.intent, classification.medical_kind) {
        (Intent::Medical, Some(kind)) => kind.label().to_string(),
        (Intent::BrandSpecific, _) => classification
            .matched_keywords
            .first()
            .cloned()
            .unwrap_or_else(|| Intent::BrandSpecific.label().to_string()),
        (intent, _) if classification.all_partners && !intent.is_category_intent() => {
            "合作商家".to_string()
        }
        (intent, _) => intent.label().to_string(),
    }
}

fn recommendation_body(classification: &Classification, result: &RecommendationResult) -> String {
    let subject = subject(classification);

    if result.is_empty() {
        return format!(
            "{}，目前在{}的資料中{}符合「{}」的商家。\n請試試其他關鍵字，或換個方式描述您的需求。",
            APOLOGY, DISTRICT_NAME, NOT_FOUND_MARKER, subject
        );
    }

    let mut body = format!("為您推薦以下{}：\n", subject);
    for (index, item) in result.items.iter().enumerate() {
        body.push('\n');
        write_store(&mut body, index + 1, item);
    }

    if result.candidate_count > result.items.len() {
        body.push_str(&format!(
            "\n還有 {} 家符合的店家，想看更多可以再問我一次喔！",
            result.candidate_count - result.items.len()
        ));
    } else {
        body.push_str("\n需要更多資訊可以再問我喔！");
    }
    body
}

fn write_store(out: &mut String, number: usize, item: &RecommendedStore) {
    let store = &item.store;
    let mut badges = String::new();
    if store.is_partner {
        badges.push_str("【合作商家】");
    }
    if store.is_trusted {
        badges.push_str("【安心店家】");
    }
    if store.has_discount {
        badges.push_str("【優惠】");
    }

    out.push_str(&format!("{}. {}{}\n", number, store.name, badges));
    if let Some(address) = store.address.as_deref().filter(|a| !a.is_empty()) {
        out.push_str(&format!("   地址：{}\n", address));
    }
    if let Some(phone) = store.phone.as_deref().filter(|p| !p.is_empty()) {
        out.push_str(&format!("   電話：{}\n", phone));
    }
    if let Some(hours) = store.business_hours.as_deref().filter(|h| !h.is_empty()) {
        out.push_str(&format!("   營業時間：{}\n", hours));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IntentClassifier;
    use crate::retriever::{retrieve, RetrievalOptions};
    use crate::store::{Approval, Store, StoreFeatures};

    fn store(id: i64, name: &str, category: &str) -> Store {
        Store {
            id,
            name: name.to_string(),
            category: category.to_string(),
            subcategory: None,
            address: Some("文山區木柵路一段1號".to_string()),
            phone: Some("02-1234-5678".to_string()),
            business_hours: None,
            features: StoreFeatures::default(),
            is_trusted: true,
            has_discount: false,
            is_partner: false,
            rating: 4.0,
            approval: Approval::Approved,
        }
    }

    fn renderer() -> ResponseRenderer {
        ResponseRenderer::with_signature("高文文 v9.9.9")
    }

    #[test]
    fn test_recommendation_lists_only_result_stores() {
        let classifier = IntentClassifier::builtin().unwrap();
        let c = classifier.classify("推薦餐廳").unwrap();
        let stores = vec![store(1, "文山小館", "餐飲美食"), store(2, "木柵書店", "購物")];
        let result = retrieve(&c, &stores, &RetrievalOptions::default());

        let text = renderer().recommendation(&c, &result);
        assert!(text.contains("文山小館"));
        assert!(text.contains("【安心店家】"));
        assert!(!text.contains("木柵書店"));
        assert!(text.ends_with("高文文 v9.9.9"));
    }

    #[test]
    fn test_store_block_layout_and_remainder() {
        let classifier = IntentClassifier::builtin().unwrap();
        let c = classifier.classify("推薦餐廳").unwrap();
        let stores: Vec<Store> = (1..=5)
            .map(|i| store(i, &format!("小館{}", i), "餐飲美食"))
            .collect();
        let result = retrieve(&c, &stores, &RetrievalOptions::default());
        assert_eq!(result.items.len(), 3);

        let text = renderer().recommendation(&c, &result);
        assert!(text.contains("\n1. 小館1【安心店家】\n   地址：文山區木柵路一段1號\n   電話：02-1234-5678\n"));
        assert!(!text.contains("營業時間"));
        assert!(text.contains("還有 2 家符合的店家"));
    }

    #[test]
    fn test_mixed_sections_are_numbered() {
        let classifier = IntentClassifier::builtin().unwrap();
        let c = classifier.classify("我想看牙醫，之後去吃午餐").unwrap();
        let other = c.mixed_with.as_deref().unwrap();
        let stores = vec![store(1, "文山小館", "餐飲美食")];
        let primary = retrieve(&c, &stores, &RetrievalOptions::default());
        let secondary = retrieve(other, &stores, &RetrievalOptions::default());

        let text = renderer().mixed((&c, &primary), (other, &secondary));
        assert!(text.contains("【1】"));
        assert!(text.contains("【2】"));
        assert!(text.contains("文山小館"));
        assert!(text.ends_with("高文文 v9.9.9"));
    }

    #[test]
    fn test_not_found_is_honest() {
        let classifier = IntentClassifier::builtin().unwrap();
        let c = classifier.classify("我想找藥局").unwrap();
        let stores = vec![store(1, "文山小館", "餐飲美食")];
        let result = retrieve(&c, &stores, &RetrievalOptions::default());

        let text = renderer().recommendation(&c, &result);
        assert!(text.contains(APOLOGY));
        assert!(text.contains(NOT_FOUND_MARKER));
        assert!(text.contains("藥局"));
        assert!(!text.contains("文山小館"));
    }

    #[test]
    fn test_coverage_numbers_verbatim() {
        let stats = CoverageStats {
            total_stores: 280,
            trusted_stores: 16,
            discount_stores: 18,
            partner_stores: 1,
            category_count: 11,
        };
        let text = renderer().coverage(&stats);
        for needle in ["280 家商家", "安心店家：16 家", "優惠店家：18 家", "合作商家：1 家", "11 類"] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_every_template_has_signature() {
        let classifier = IntentClassifier::builtin().unwrap();
        let r = renderer();
        for msg in ["你是誰", "怎麼去", "好", "你好", "今天天氣", "嗯哼"] {
            let c = classifier.classify(msg).unwrap();
            assert!(r.conversational(&c).ends_with(r.signature()), "{msg}");
        }
        assert!(r.daily_limit().ends_with(r.signature()));
        assert!(r.faq("  答案  ").starts_with("答案"));
    }
}
