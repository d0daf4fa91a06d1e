//! FAQs, quick questions and training examples.

use super::{row_ts, ts, Database};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};
use tracing::warn;
use wenwen_shared::content::{Faq, QuickQuestion, TrainingExample};
use wenwen_shared::Intent;

fn faq_from_row(row: &Row) -> rusqlite::Result<Faq> {
    let id: i64 = row.get(0)?;
    let raw_keywords: String = row.get(3)?;
    let keywords = serde_json::from_str::<Vec<String>>(&raw_keywords).unwrap_or_else(|e| {
        warn!("FAQ {} has malformed keywords, ignoring them: {}", id, e);
        Vec::new()
    });
    Ok(Faq {
        id,
        question: row.get(1)?,
        answer: row.get(2)?,
        keywords,
        category: row.get(4)?,
        is_active: row.get(5)?,
    })
}

fn quick_question_from_row(row: &Row) -> rusqlite::Result<QuickQuestion> {
    Ok(QuickQuestion {
        id: row.get(0)?,
        text: row.get(1)?,
        display_order: row.get(2)?,
        is_active: row.get(3)?,
    })
}

fn training_from_row(row: &Row) -> rusqlite::Result<TrainingExample> {
    let raw_intent: String = row.get(2)?;
    let expected_intent = raw_intent.parse::<Intent>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(TrainingExample {
        id: row.get(0)?,
        query: row.get(1)?,
        expected_intent,
        expected_answer: row.get(3)?,
        created_at: row_ts(4, row.get(4)?)?,
    })
}

impl Database {
    // ------------------------------------------------------------------
    // FAQs
    // ------------------------------------------------------------------

    pub fn list_faqs(&self, active_only: bool) -> Result<Vec<Faq>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, question, answer, keywords, category, is_active FROM faqs
            WHERE (?1 = 0 OR is_active = 1) ORDER BY id
            "#,
        )?;
        let faqs = stmt
            .query_map(params![active_only], faq_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(faqs)
    }

    /// Insert when `faq.id` is 0, otherwise update. Returns the id, or None
    /// when updating an id that does not exist.
    pub fn save_faq(&self, faq: &Faq) -> Result<Option<i64>> {
        let keywords = serde_json::to_string(&faq.keywords)?;
        let now = ts(Utc::now());
        let conn = self.lock();
        if faq.id == 0 {
            conn.execute(
                r#"
                INSERT INTO faqs (question, answer, keywords, category, is_active, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![&faq.question, &faq.answer, keywords, &faq.category, faq.is_active, now],
            )?;
            return Ok(Some(conn.last_insert_rowid()));
        }
        let changed = conn.execute(
            r#"
            UPDATE faqs SET question = ?2, answer = ?3, keywords = ?4, category = ?5,
                is_active = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
            params![faq.id, &faq.question, &faq.answer, keywords, &faq.category, faq.is_active, now],
        )?;
        Ok((changed > 0).then_some(faq.id))
    }

    pub fn delete_faq(&self, id: i64) -> Result<bool> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM faqs WHERE id = ?1", params![id])? > 0)
    }

    // ------------------------------------------------------------------
    // Quick questions
    // ------------------------------------------------------------------

    pub fn list_quick_questions(&self, active_only: bool) -> Result<Vec<QuickQuestion>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, text, display_order, is_active FROM quick_questions
            WHERE (?1 = 0 OR is_active = 1) ORDER BY display_order, id
            "#,
        )?;
        let questions = stmt
            .query_map(params![active_only], quick_question_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(questions)
    }

    /// Insert when `question.id` is 0, otherwise update
    pub fn save_quick_question(&self, question: &QuickQuestion) -> Result<Option<i64>> {
        let conn = self.lock();
        if question.id == 0 {
            conn.execute(
                "INSERT INTO quick_questions (text, display_order, is_active) VALUES (?1, ?2, ?3)",
                params![&question.text, question.display_order, question.is_active],
            )?;
            return Ok(Some(conn.last_insert_rowid()));
        }
        let changed = conn.execute(
            "UPDATE quick_questions SET text = ?2, display_order = ?3, is_active = ?4 WHERE id = ?1",
            params![question.id, &question.text, question.display_order, question.is_active],
        )?;
        Ok((changed > 0).then_some(question.id))
    }

    pub fn delete_quick_question(&self, id: i64) -> Result<bool> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM quick_questions WHERE id = ?1", params![id])? > 0)
    }

    // ------------------------------------------------------------------
    // Training data
    // ------------------------------------------------------------------

    pub fn list_training(&self) -> Result<Vec<TrainingExample>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, query, expected_intent, expected_answer, created_at FROM training_data ORDER BY id",
        )?;
        let examples = stmt
            .query_map([], training_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(examples)
    }

    pub fn insert_training(&self, example: &TrainingExample) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO training_data (query, expected_intent, expected_answer, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                &example.query,
                example.expected_intent.as_str(),
                &example.expected_answer,
                ts(example.created_at)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faq(question: &str, active: bool) -> Faq {
        Faq {
            id: 0,
            question: question.to_string(),
            answer: "週一至週日 10:00-22:00".to_string(),
            keywords: vec!["營業時間".to_string(), "幾點".to_string()],
            category: Some("一般".to_string()),
            is_active: active,
        }
    }

    #[test]
    fn test_faq_save_list_delete() {
        let db = Database::open_in_memory().unwrap();
        let id = db.save_faq(&faq("特區營業時間", true)).unwrap().unwrap();
        db.save_faq(&faq("停用的問題", false)).unwrap();

        assert_eq!(db.list_faqs(false).unwrap().len(), 2);
        let active = db.list_faqs(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].keywords, vec!["營業時間", "幾點"]);

        let mut edited = active[0].clone();
        edited.answer = "全年無休".to_string();
        assert_eq!(db.save_faq(&edited).unwrap(), Some(id));
        assert_eq!(db.list_faqs(true).unwrap()[0].answer, "全年無休");

        edited.id = 404;
        assert_eq!(db.save_faq(&edited).unwrap(), None);
        assert!(db.delete_faq(id).unwrap());
        assert!(!db.delete_faq(id).unwrap());
    }

    #[test]
    fn test_quick_questions_sorted_by_display_order() {
        let db = Database::open_in_memory().unwrap();
        for (text, order) in [("停車資訊", 2), ("推薦美食", 1), ("找藥局", 3)] {
            db.save_quick_question(&QuickQuestion {
                id: 0,
                text: text.to_string(),
                display_order: order,
                is_active: true,
            })
            .unwrap();
        }
        let texts: Vec<String> = db
            .list_quick_questions(true)
            .unwrap()
            .into_iter()
            .map(|q| q.text)
            .collect();
        assert_eq!(texts, vec!["推薦美食", "停車資訊", "找藥局"]);
    }

    #[test]
    fn test_training_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_training(&TrainingExample {
                id: 0,
                query: "我想找藥局".to_string(),
                expected_intent: Intent::Medical,
                expected_answer: None,
                created_at: Utc::now(),
            })
            .unwrap();
        let examples = db.list_training().unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].id, id);
        assert_eq!(examples[0].expected_intent, Intent::Medical);
        assert_eq!(examples[0].query, "我想找藥局");
        assert!(examples[0].expected_answer.is_none());
    }

    #[test]
    fn test_training_row_with_unknown_intent_fails() {
        let db = Database::open_in_memory().unwrap();
        db.lock()
            .execute(
                "INSERT INTO training_data (query, expected_intent, created_at) VALUES (?1, ?2, ?3)",
                params!["隨便", "WEATHER", ts(Utc::now())],
            )
            .unwrap();
        let err = db.list_training().unwrap_err();
        assert!(format!("{:#}", err).contains("WEATHER"));
    }
}
