use serde_json::json;
use tera::{Context, Tera};

use crate::domain::event::EventContext;
use crate::domain::item::ItemId;
use crate::item_config::PricingConfig;
use crate::pricing::PriceField;

const ITEM_DESCRIPTION_TEMPLATE: &str = "item_description.html";

const ITEM_DESCRIPTION_SOURCE: &str = r#"<div class="pwyc-container-{{ item_id }}">
    <div class="pwyc-data" style="display: none;" data-pwyc="{{ payload }}"></div>
    <div id="pwyc-form-{{ item_id }}" class="pwyc-form">
        {% if explanation %}<p class="pwyc-explanation">{{ explanation }}</p>{% endif %}
        <label class="pwyc-label" for="pwyc-price-{{ item_id }}">{{ field.label }}</label>
        <div class="input-group">
            <input type="number" class="form-control pwyc-price-input"
                id="pwyc-price-{{ item_id }}" name="pwyc_price_{{ item_id }}"
                min="{{ field.min_value }}" step="{{ field.step }}"
                {%- if field.initial %} value="{{ field.initial }}"{% endif %}
                data-item-id="{{ item_id }}" data-event="{{ event_ref }}">
            <span class="input-group-addon">{{ currency }}</span>
        </div>
        {% if field.help_text %}<p class="pwyc-help">{{ field.help_text }}</p>{% endif %}
        <p class="pwyc-feedback" role="status"></p>
    </div>
</div>
<script>
(function () {
    var input = document.getElementById("pwyc-price-{{ item_id }}");
    if (!input) return;
    var feedback = input.closest(".pwyc-form").querySelector(".pwyc-feedback");
    input.addEventListener("change", function () {
        fetch("/pwyc/set-price/", {
            method: "POST",
            credentials: "same-origin",
            headers: { "Content-Type": "application/json" },
            body: JSON.stringify({
                item_id: input.dataset.itemId,
                price: input.value,
                event: input.dataset.event
            })
        }).then(function (response) {
            return response.json().then(function (payload) {
                feedback.textContent = response.ok
                    ? "Custom price saved: " + payload.price
                    : payload.error;
            });
        }).catch(function () {
            feedback.textContent = "Failed to save price. Please try again.";
        });
    });
})();
</script>
"#;

/// Renders the markup the client-side price widget attaches to.
pub struct DescriptionRenderer {
    tera: Tera,
}

impl DescriptionRenderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(ITEM_DESCRIPTION_TEMPLATE, ITEM_DESCRIPTION_SOURCE)?;
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        event: &EventContext,
        item: ItemId,
        config: &PricingConfig,
    ) -> Result<String, tera::Error> {
        let field = PriceField::for_config(config);
        let payload = json!({
            "item_id": item.0,
            "min_amount": config.min_amount.map(|value| value.to_string()).unwrap_or_default(),
            "suggested_amount":
                config.suggested_amount.map(|value| value.to_string()).unwrap_or_default(),
            "explanation": config.explanation,
            "currency": event.currency,
            "min_value": field.min_value.to_string(),
            "step": field.step.to_string(),
        });

        let mut context = Context::new();
        context.insert("item_id", &item.0);
        context.insert("payload", &payload.to_string());
        context.insert("field", &field);
        context.insert("explanation", &config.explanation);
        context.insert("currency", &event.currency);
        context.insert("event_ref", &event.id.to_string());
        self.tera.render(ITEM_DESCRIPTION_TEMPLATE, &context)
    }
}
