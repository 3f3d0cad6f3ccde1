//! Landing page content served to the frontend.

use serde::Serialize;

/// Hero banner.
#[derive(Debug, Clone, Serialize)]
pub struct Hero {
    pub headline: &'static str,
    pub subheadline: &'static str,
    pub cta_label: &'static str,
}

/// Feature card.
#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    pub icon: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

/// Pricing plan.
#[derive(Debug, Clone, Serialize)]
pub struct PricingPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub price_cents: i64,
    /// e.g. "R$ 29,90"
    pub price_label: String,
    pub period: &'static str,
    pub perks: Vec<&'static str>,
    pub highlighted: bool,
}

/// Customer quote.
#[derive(Debug, Clone, Serialize)]
pub struct Testimonial {
    pub name: &'static str,
    pub role: &'static str,
    pub quote: &'static str,
    pub rating: u8,
}

/// Everything the marketing page renders.
#[derive(Debug, Clone, Serialize)]
pub struct MarketingContent {
    pub hero: Hero,
    pub features: Vec<Feature>,
    pub pricing: Vec<PricingPlan>,
    pub testimonials: Vec<Testimonial>,
    pub trial_hours: u32,
}

/// Format cents as a BRL price label.
pub fn format_brl(cents: i64) -> String {
    let reais = cents / 100;
    let rest = (cents % 100).abs();

    let digits = reais.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if cents < 0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, rest)
}

/// Build the page content for the configured price and trial.
pub fn content(monthly_price_cents: i64, trial_hours: u32) -> MarketingContent {
    MarketingContent {
        hero: Hero {
            headline: "Seu personal trainer com inteligência artificial",
            subheadline: "Treinos e dicas de nutrição personalizados, conquistas, \
                          comunidade e acompanhamento do seu progresso.",
            cta_label: "Começar teste grátis",
        },
        features: vec![
            Feature {
                icon: "dumbbell",
                title: "Treinos com IA",
                description: "Peça treinos adaptados ao seu nível, tempo e equipamentos.",
            },
            Feature {
                icon: "apple",
                title: "Nutrição inteligente",
                description: "Tire dúvidas sobre alimentação e monte refeições equilibradas.",
            },
            Feature {
                icon: "trophy",
                title: "Gamificação",
                description: "Ganhe XP, suba de nível, mantenha sequências e desbloqueie conquistas.",
            },
            Feature {
                icon: "users",
                title: "Comunidade",
                description: "Compartilhe progresso e motivação com outros alunos no fórum.",
            },
        ],
        pricing: vec![
            PricingPlan {
                id: "trial",
                name: "Teste grátis",
                price_cents: 0,
                price_label: format_brl(0),
                period: "24 horas",
                perks: vec!["Acesso completo", "Sem cartão de crédito"],
                highlighted: false,
            },
            PricingPlan {
                id: "premium_monthly",
                name: "Premium",
                price_cents: monthly_price_cents,
                price_label: format_brl(monthly_price_cents),
                period: "mês",
                perks: vec![
                    "Assistentes de treino e nutrição ilimitados",
                    "Gamificação completa",
                    "Comunidade exclusiva",
                    "Pagamento via PIX",
                ],
                highlighted: true,
            },
        ],
        testimonials: vec![
            Testimonial {
                name: "Juliana M.",
                role: "Aluna há 3 meses",
                quote: "Nunca consegui manter uma rotina. Com as sequências diárias virei outra pessoa!",
                rating: 5,
            },
            Testimonial {
                name: "Carlos R.",
                role: "Corredor amador",
                quote: "Os treinos gerados pela IA encaixam certinho no meu horário de almoço.",
                rating: 5,
            },
            Testimonial {
                name: "Patrícia S.",
                role: "Mãe e empreendedora",
                quote: "As dicas de nutrição são práticas e a comunidade é muito acolhedora.",
                rating: 4,
            },
        ],
        trial_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(2990), "R$ 29,90");
        assert_eq!(format_brl(0), "R$ 0,00");
        assert_eq!(format_brl(123456789), "R$ 1.234.567,89");
        assert_eq!(format_brl(-505), "-R$ 5,05");
    }

    #[test]
    fn test_pricing_uses_configured_price() {
        let page = content(4990, 24);
        let premium = page.pricing.iter().find(|p| p.id == "premium_monthly").unwrap();
        assert_eq!(premium.price_cents, 4990);
        assert_eq!(premium.price_label, "R$ 49,90");
        assert!(premium.highlighted);
        assert_eq!(page.features.len(), 4);
    }
}
