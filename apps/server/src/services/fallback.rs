//! Deterministic content used when the generator cannot be trusted.
//!
//! Output depends only on the prompt and tags, so replaying a worker step
//! produces the same article.

use crate::models::{Content, Section};

fn topic_phrase(tags: &[String]) -> String {
    let tags: Vec<String> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("#{}", t))
        .collect();

    if tags.is_empty() {
        "lingkungan dan keberlanjutan".to_string()
    } else {
        tags.join(", ")
    }
}

/// Builds a three-section article (introduction, importance, practical steps)
/// around the prompt and tags. Never fails.
pub fn synthesize(prompt: &str, tags: &[String]) -> Content {
    let prompt = prompt.trim();
    let topics = topic_phrase(tags);

    let sections = vec![
        Section {
            title: "Pendahuluan".to_string(),
            body: format!(
                "Artikel ini membahas \"{}\". Topik ini berkaitan dengan {} dan \
                 dapat dipahami oleh siapa saja yang ingin mulai belajar.",
                prompt, topics
            ),
        },
        Section {
            title: "Mengapa Ini Penting".to_string(),
            body: format!(
                "Memahami \"{}\" membantu kita mengambil keputusan sehari-hari yang \
                 lebih baik. Kebiasaan kecil yang dilakukan bersama-sama memberi \
                 dampak besar bagi {}.",
                prompt, topics
            ),
        },
        Section {
            title: "Langkah Praktis".to_string(),
            body: format!(
                "1. Pelajari dasar-dasar \"{prompt}\" dari sumber yang terpercaya.\n\
                 2. Mulai dari satu kebiasaan sederhana dan lakukan secara konsisten.\n\
                 3. Ajak keluarga atau teman untuk ikut serta.\n\
                 4. Catat kemajuan dan evaluasi secara berkala."
            ),
        },
    ];

    Content {
        title: format!("Panduan Singkat: {}", prompt),
        body: format!(
            "Berikut panduan singkat tentang \"{}\" ({}). Konten ini disusun otomatis \
             dan dapat dibuat ulang kapan saja untuk mendapatkan versi yang lebih lengkap.",
            prompt, topics
        ),
        sections,
    }
}
