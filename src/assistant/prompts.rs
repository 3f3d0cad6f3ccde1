//! System prompts and fallback replies.

use super::types::AssistantKind;

const WORKOUT_PROMPT: &str = "Você é o FitCoach, um personal trainer virtual experiente e motivador. \
Monte treinos seguros e objetivos, adaptados ao nível, aos equipamentos disponíveis e ao tempo do usuário. \
Explique a execução dos exercícios, séries, repetições e descanso. \
Sempre recomende procurar um profissional de saúde em caso de dor ou condição médica. \
Responda em português do Brasil.";

const NUTRITION_PROMPT: &str = "Você é o FitCoach Nutri, um assistente de nutrição esportiva. \
Dê orientações práticas sobre alimentação, macronutrientes, hidratação e planejamento de refeições \
alinhadas aos objetivos do usuário. Não prescreva dietas clínicas nem suplementos com fins terapêuticos; \
oriente a buscar um nutricionista quando necessário. Responda em português do Brasil.";

const WORKOUT_FALLBACK: &str = "Desculpe, não consegui gerar seu treino agora. \
Enquanto isso, experimente: 10 minutos de aquecimento, 3 séries de 12 agachamentos, \
3 séries de 10 flexões, 3 séries de 30 segundos de prancha e 5 minutos de alongamento. \
Tente novamente em alguns instantes!";

const NUTRITION_FALLBACK: &str = "Desculpe, não consegui responder agora. \
Algumas dicas gerais: priorize alimentos naturais, inclua proteína em todas as refeições, \
beba bastante água e mantenha horários regulares. Tente novamente em alguns instantes!";

/// System prompt for an assistant.
pub fn system_prompt(kind: AssistantKind) -> &'static str {
    match kind {
        AssistantKind::Workout => WORKOUT_PROMPT,
        AssistantKind::Nutrition => NUTRITION_PROMPT,
    }
}

/// Canned reply used when the model is unavailable.
pub fn fallback_reply(kind: AssistantKind) -> &'static str {
    match kind {
        AssistantKind::Workout => WORKOUT_FALLBACK,
        AssistantKind::Nutrition => NUTRITION_FALLBACK,
    }
}
