//! Prompt text and response schemas for the classification requests
//!
//! Prompts are Spanish because the categories and the generated text are.
//! Schemas use the upper-case type names of Gemini's `responseSchema`.

use crate::models::{Difficulty, OriginCategory};
use serde_json::{json, Value};

/// System message for chat-style backends
pub const SYSTEM_PROMPT: &str =
    "Sigue las instrucciones al pie de la letra. Si se pide JSON, responde solo con un objeto JSON válido.";

pub fn origin_prompt(name: &str) -> String {
    let categories: Vec<&str> = OriginCategory::ALL.iter().map(|c| c.label()).collect();
    format!(
        r#"Clasifica el nombre "{name}" según su origen etimológico.

Reglas para nombres compuestos:
- Mezcla de componente anglosajón y español (p. ej. "Brandon José"): "Latinoamericano".
- En otro caso, decide por el componente más alejado del español ("María Aitor" es "Vasco", "Juan Chen" es "Chino").

"Español" cubre los nombres latinos, bíblicos y germánicos ya castellanizados (María, José, Guillermo, Fernando).
Usa otra categoría solo si el nombre conserva su forma extranjera.
Si dudas usa "Desconocido"; si no encaja en ninguna usa "Otro".

Categorías permitidas: {categories}.

Responde con un JSON con la clave "origin"."#,
        name = name,
        categories = categories.join(", ")
    )
}

pub fn description_prompt(name: &str, origin: &str) -> String {
    format!(
        r#"Escribe una descripción breve del nombre "{name}", de origen {origin}.

Incluye cuando sea posible su significado, su contexto histórico o cultural, personas conocidas que lo lleven y variantes en otros idiomas.
Si es compuesto, habla de ambas partes. Omite lo que no puedas verificar.

Como máximo 150 palabras, en español, texto plano sin markdown ni símbolos especiales, nombres propios con mayúscula inicial."#,
        name = name,
        origin = origin
    )
}

pub fn pronunciation_prompt(name: &str, origin: &str) -> String {
    format!(
        r#"Evalúa lo difícil que es pronunciar el nombre "{name}" (origen: {origin}).

Para hablantes de español:
- muy fácil: solo fonemas habituales del español (María, Carlos)
- fácil: alguna combinación poco frecuente (Xavier, Ainhoa)
- difícil: fonemas extranjeros adaptables (Jennifer, Kevin)
- muy difícil: fonemas muy ajenos al español (Txomin, Nguyen)

Para hablantes extranjeros, sobre todo de inglés:
- muy fácil: nombres internacionales (Ana, David)
- fácil: pocas particularidades del español (Carmen, Pablo)
- difícil: sonidos propios del español como rr, ñ o j
- muy difícil: varios sonidos difíciles (Guillermo, Enrique)

En la explicación (máximo 100 palabras) señala los sonidos problemáticos, las letras mudas y la diferencia entre ambos grupos.

Responde con un JSON con las claves "spanish", "foreign" y "explanation"."#,
        name = name,
        origin = origin
    )
}

pub fn origin_schema() -> Value {
    let labels: Vec<&str> = OriginCategory::ALL.iter().map(|c| c.label()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "origin": { "type": "STRING", "enum": labels }
        },
        "required": ["origin"]
    })
}

pub fn pronunciation_schema() -> Value {
    let levels: Vec<&str> = Difficulty::ALL.iter().map(|d| d.label()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "spanish": { "type": "STRING", "enum": levels },
            "foreign": { "type": "STRING", "enum": levels },
            "explanation": { "type": "STRING" }
        },
        "required": ["spanish", "foreign", "explanation"]
    })
}
