//! Query sets for benchmarking.
//!
//! Supports:
//! - A JSON query-set format for user-provided queries
//! - A built-in sample corpus with a fixed set of ten queries

use crate::document::Document;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single benchmark query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkQuery {
    /// Unique identifier for this query.
    pub id: String,
    /// The query text.
    pub text: String,
    /// Ids of documents that answer the query (optional).
    #[serde(default)]
    pub relevant_documents: Vec<String>,
}

impl BenchmarkQuery {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            relevant_documents: Vec::new(),
        }
    }

    pub fn with_relevant(mut self, documents: &[&str]) -> Self {
        self.relevant_documents = documents.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// A named, ordered collection of queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySet {
    pub name: String,
    pub queries: Vec<BenchmarkQuery>,
}

impl QuerySet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queries: Vec::new(),
        }
    }

    pub fn add_query(&mut self, query: BenchmarkQuery) {
        self.queries.push(query);
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// First `n` queries (for quick runs).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            queries: self.queries.iter().take(n).cloned().collect(),
        }
    }

    /// Load from a JSON file.
    ///
    /// Expected format:
    /// ```json
    /// {
    ///   "name": "my_queries",
    ///   "queries": [
    ///     { "id": "q1", "text": "What is X?", "relevant_documents": ["x.txt"] }
    ///   ]
    /// }
    /// ```
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read query set file: {:?}", path))?;
        let set: QuerySet =
            serde_json::from_str(&content).with_context(|| "Failed to parse query set JSON")?;
        if set.is_empty() {
            anyhow::bail!("Query set {:?} contains no queries", path);
        }
        Ok(set)
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}

/// A small encyclopedia-style corpus about Indonesia.
pub fn sample_corpus() -> Vec<Document> {
    let sections: [(&str, &str); 8] = [
        (
            "overview",
            "Indonesia is a country in Southeast Asia and Oceania, located between the Indian and Pacific oceans. \
It is the largest archipelagic state in the world and a presidential republic.\n\n\
Indonesia declared independence on 17 August 1945. The country is a founding member of ASEAN \
and a member of the G20. Its economy is the largest in Southeast Asia.\n\n\
The national motto is Bhinneka Tunggal Ika, usually translated as Unity in Diversity, \
reflecting the many ethnic groups, languages and religions of the nation.",
        ),
        (
            "geography",
            "Indonesia covers a total area of about 1,904,569 square kilometres, of which roughly \
1,811,569 square kilometres is land. The country stretches more than 5,000 kilometres from east to west.\n\n\
The archipelago lies on the Pacific Ring of Fire. It has around 130 active volcanoes, \
and earthquakes are frequent. The climate is tropical, with a wet season and a dry season.\n\n\
Dense rainforests cover much of Borneo, Sumatra and Papua. These forests are home to orangutans, \
tigers and rhinoceroses, many of which are endangered.",
        ),
        (
            "population",
            "The population of Indonesia is about 280 million people, making it the fourth most populous \
country in the world after India, China and the United States.\n\n\
More than half of the population lives on the island of Java, one of the most densely populated \
places on Earth. Population growth has slowed in recent decades.\n\n\
The largest ethnic group is the Javanese, who make up around 40 percent of the population. \
Other major groups include the Sundanese, Malay, Batak, Madurese, Minangkabau and Buginese peoples. \
In total there are more than 300 ethnic groups.",
        ),
        (
            "capital",
            "The capital and largest city of Indonesia is Jakarta, located on the northwest coast of Java. \
The Jakarta metropolitan area has more than 30 million inhabitants.\n\n\
Because Jakarta is sinking and overcrowded, the government is building a new capital called Nusantara \
in East Kalimantan on the island of Borneo. The transfer of government functions began in 2024.",
        ),
        (
            "religion",
            "Indonesia has the largest Muslim population in the world. About 87 percent of Indonesians \
are Muslim, most of them Sunni.\n\n\
The constitution guarantees freedom of religion, and the state officially recognizes six religions: \
Islam, Protestantism, Catholicism, Hinduism, Buddhism and Confucianism.\n\n\
Bali is a notable exception to the Muslim majority. Most Balinese practise Balinese Hinduism, \
and the island has thousands of temples.",
        ),
        (
            "languages",
            "The official language is Indonesian, a standardized form of Malay. It is taught in schools \
and used in government, media and business.\n\n\
More than 700 regional languages are spoken across the archipelago. Javanese has the most native \
speakers, followed by Sundanese, Madurese and Minangkabau.\n\n\
Most Indonesians are bilingual, speaking a regional language at home and Indonesian in public life.",
        ),
        (
            "cities",
            "Major cities of Indonesia include Jakarta, Surabaya, Bandung, Medan, Semarang and Makassar. \
Surabaya is the second largest city and an important port in East Java.\n\n\
Bandung is known for its cool highland climate and its universities. Medan is the largest city \
on Sumatra. Yogyakarta is a centre of Javanese culture, education and traditional arts.",
        ),
        (
            "islands",
            "Indonesia consists of more than 17,000 islands, of which about 6,000 are inhabited. \
The five largest islands are New Guinea, Borneo, Sumatra, Sulawesi and Java.\n\n\
Indonesia shares land borders with Malaysia on Borneo, Papua New Guinea on New Guinea, \
and East Timor on the island of Timor.\n\n\
Famous attractions include the Buddhist temple of Borobudur and the Hindu temple of Prambanan near Yogyakarta, \
the beaches and rice terraces of Bali, Komodo National Park with its giant lizards, \
and the volcanic crater lake of Lake Toba in Sumatra.",
        ),
    ];

    sections
        .iter()
        .map(|(id, text)| Document::new(*id, *text).with_metadata("source", "sample"))
        .collect()
}

/// The ten fixed queries over [`sample_corpus`].
pub fn sample_queries() -> QuerySet {
    let mut set = QuerySet::new("sample");
    let queries: [(&str, &[&str]); 10] = [
        ("What is Indonesia?", &["overview"]),
        ("What is the area of Indonesia?", &["geography"]),
        ("What is the population of Indonesia?", &["population"]),
        ("What is the capital of Indonesia?", &["capital"]),
        ("What religion is practised in Indonesia?", &["religion"]),
        ("What languages are spoken in Indonesia?", &["languages"]),
        ("What ethnic groups live in Indonesia?", &["population"]),
        ("What are the major cities in Indonesia?", &["cities", "capital"]),
        ("What islands make up Indonesia?", &["islands"]),
        ("What are the tourist attractions in Indonesia?", &["islands"]),
    ];

    for (i, (text, relevant)) in queries.iter().enumerate() {
        set.add_query(BenchmarkQuery::new(format!("q{}", i + 1), *text).with_relevant(relevant));
    }
    set
}
