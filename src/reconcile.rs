//! Stage 2: ask the model to compare the two extractions.
//!
//! The reply is free text that should end in a fenced ```json block with
//! `score`, `produtos_match` and `nota_match`. Model formatting is not
//! guaranteed, so a missing or broken block leaves `parsed_payload` empty
//! instead of failing the reconciliation.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ReconciliationError;
use crate::types::{ImageRole, ReconciliationReport, VerdictPayload};
use crate::vision::{ChatModel, ContentPart};

const PROMPT_HEADER: &str = "Realize um cruzamento SIMPLIFICADO e DIRETO entre as informações da caixa e da nota fiscal.
Foque EXCLUSIVAMENTE nas informações cruciais: Produtos (Nome e Quantidade) e Número da Nota.";

const PROMPT_FORMAT: &str = r#"Por favor, forneça a análise no seguinte formato:

1. COMPARAÇÃO DE PRODUTOS (Crucial):
   Liste cada produto encontrado e compare a quantidade.
   Formato:
   - [Nome do Produto]: Caixa [Qtd] x Nota [Qtd] -> [Status: OK/DIVERGENTE]

2. COMPARAÇÃO DO NÚMERO DA NOTA:
   - Caixa: [Número]
   - Nota: [Número]
   - Status: [OK/DIVERGENTE]

3. CONCLUSÃO RÁPIDA:
   - Aprovado ou Reprovado com base apenas nos produtos e número da nota.

4. DADOS ESTRUTURADOS (JSON):
   Por favor, inclua ao final da resposta, EXATAMENTE o seguinte bloco JSON (e nada mais depois dele):
   ```json
   {
       "score": <numero_inteiro_0_a_100_baseado_apenas_em_produtos_e_numero_nota>,
       "produtos_match": <true_se_nomes_e_quantidades_batem_senao_false>,
       "nota_match": <true_se_numero_nota_igual_senao_false>
   }
   ```"#;

/// Single prompt embedding both extractions verbatim.
pub fn reconciliation_prompt(package_text: &str, invoice_text: &str) -> String {
    format!(
        "{}\n\nINFORMAÇÕES DA CAIXA:\n{}\n\nINFORMAÇÕES DA NOTA FISCAL:\n{}\n\n{}",
        PROMPT_HEADER, package_text, invoice_text, PROMPT_FORMAT
    )
}

pub fn reconcile<M: ChatModel + ?Sized>(
    model: &M,
    package_text: &str,
    invoice_text: &str,
) -> Result<ReconciliationReport, ReconciliationError> {
    if package_text.trim().is_empty() {
        return Err(ReconciliationError::EmptyInput(ImageRole::Package));
    }
    if invoice_text.trim().is_empty() {
        return Err(ReconciliationError::EmptyInput(ImageRole::Invoice));
    }

    tracing::info!(
        package_chars = package_text.len(),
        invoice_chars = invoice_text.len(),
        "Reconciling extractions"
    );
    let raw_text = model.complete(vec![ContentPart::Text(reconciliation_prompt(
        package_text,
        invoice_text,
    ))])?;

    let parsed_payload = try_extract_payload(&raw_text);
    if parsed_payload.is_none() {
        tracing::warn!("No usable verdict block in reconciliation reply; manual review needed");
    }
    Ok(ReconciliationReport {
        raw_text,
        parsed_payload,
    })
}

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("json block regex"))
}

/// Locate the first fenced ```json block and read the verdict fields from it.
pub fn try_extract_payload(text: &str) -> Option<VerdictPayload> {
    let block = json_block_re().captures(text)?.get(1)?.as_str();
    let value: Value = match serde_json::from_str(block) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Verdict block is not valid JSON: {}", e);
            return None;
        }
    };
    let obj = value.as_object()?;
    Some(VerdictPayload {
        score: score_field(obj),
        products_match: flag_field(obj, "produtos_match"),
        invoice_match: flag_field(obj, "nota_match"),
    })
}

/// Missing or unreadable scores count as 0. Fractions are truncated and values
/// clamped to 0..=100; rejection reasons show the adjusted score, not the raw one.
fn score_field(obj: &Map<String, Value>) -> u8 {
    let raw = match obj.get("score") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    raw.clamp(0, 100) as u8
}

/// Missing or unreadable flags count as false.
fn flag_field(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
