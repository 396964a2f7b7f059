//! Message catalog and `Accept-Language` negotiation.
//!
//! Messages are keyed by rule id or heading key. A key missing in the
//! requested language falls back to English, then to the key itself.
//! Positional placeholders `{0}`, `{1}`, ... are replaced by arguments.

pub const DEFAULT_LANGUAGE: &str = "en";

/// Languages with a catalog, in catalog column order.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "es", "pt-br", "ru"];

/// Pick the first supported language named in an `Accept-Language` value.
pub fn negotiate_language(header: Option<&str>) -> &'static str {
    header
        .into_iter()
        .flat_map(|value| value.split(','))
        .filter_map(|candidate| {
            let tag = candidate.split(';').next().unwrap_or_default();
            canonical_language(&tag.trim().to_ascii_lowercase())
        })
        .next()
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Map a lower-case language tag to a supported language.
///
/// The full tag is tried first, then its primary subtag.
pub fn canonical_language(tag: &str) -> Option<&'static str> {
    let full = match tag {
        "en" | "en-us" | "en-gb" | "en-au" | "en-ca" | "en-nz" | "en-ie" | "en-in" => Some("en"),
        "es" | "es-es" | "es-mx" | "es-ar" | "es-co" | "es-cl" | "es-419" => Some("es"),
        "pt" | "pt-br" | "pt-pt" => Some("pt-br"),
        "ru" | "ru-ru" => Some("ru"),
        _ => None,
    };
    full.or_else(|| match tag.split('-').next() {
        Some("en") => Some("en"),
        Some("es") => Some("es"),
        Some("pt") => Some("pt-br"),
        Some("ru") => Some("ru"),
        _ => None,
    })
}

/// Message lookup for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Localizer {
    language: &'static str,
}

impl Localizer {
    /// Localizer for `language`; unsupported codes use English.
    pub fn new(language: &str) -> Self {
        let language = canonical_language(&language.to_ascii_lowercase()).unwrap_or(DEFAULT_LANGUAGE);
        Self { language }
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    /// Raw template for `key`.
    pub fn text<'k>(&self, key: &'k str) -> &'k str {
        let column = SUPPORTED_LANGUAGES
            .iter()
            .position(|lang| *lang == self.language)
            .unwrap_or(0);
        match CATALOG.iter().find(|(k, _)| *k == key) {
            Some((_, texts)) if !texts[column].is_empty() => texts[column],
            Some((_, texts)) if !texts[0].is_empty() => texts[0],
            _ => key,
        }
    }

    /// Template for `key` with `{N}` replaced by `args[N]`.
    ///
    /// Substitution is a single pass over the template; argument text is
    /// never scanned for placeholders. `{N}` without an argument stays as is.
    pub fn message<S: AsRef<str>>(&self, key: &str, args: &[S]) -> String {
        let template = self.text(key);
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open + 1..];
            let arg = tail.find('}').and_then(|close| {
                tail[..close]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| args.get(i))
                    .map(|arg| (close, arg))
            });
            match arg {
                Some((close, arg)) => {
                    out.push_str(arg.as_ref());
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = tail;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE,
        }
    }
}

type Entry = (&'static str, [&'static str; 4]);

// Columns follow SUPPORTED_LANGUAGES.
const CATALOG: &[Entry] = &[
    // Report headings
    ("title-diff", ["API changes", "Cambios en la API", "Alterações na API", "Изменения API"]),
    ("title-breaking-changes", ["Breaking changes", "Cambios incompatibles", "Alterações incompatíveis", "Несовместимые изменения"]),
    ("title-changelog", ["Changelog", "Registro de cambios", "Registro de alterações", "Журнал изменений"]),
    ("no-changes", ["No changes", "Sin cambios", "Nenhuma alteração", "Изменений нет"]),
    ("summary-counts", [
        "{0} changes: {1} error, {2} warning, {3} info",
        "{0} cambios: {1} error, {2} advertencia, {3} información",
        "{0} alterações: {1} erro, {2} aviso, {3} informação",
        "изменений: {0}; ошибок: {1}, предупреждений: {2}, информационных: {3}",
    ]),
    ("in-api", ["in API {0} {1}", "en la API {0} {1}", "na API {0} {1}", "в API {0} {1}"]),
    ("paths-added", ["Paths added", "Rutas agregadas", "Caminhos adicionados", "Добавленные пути"]),
    ("paths-deleted", ["Paths deleted", "Rutas eliminadas", "Caminhos removidos", "Удаленные пути"]),
    ("endpoints-added", ["Endpoints added", "Endpoints agregados", "Endpoints adicionados", "Добавленные эндпоинты"]),
    ("endpoints-deleted", ["Endpoints deleted", "Endpoints eliminados", "Endpoints removidos", "Удаленные эндпоинты"]),
    ("endpoints-modified", ["Endpoints modified", "Endpoints modificados", "Endpoints modificados", "Измененные эндпоинты"]),
    ("info-changed", ["API info changed", "Cambió la información de la API", "Informações da API alteradas", "Изменена информация об API"]),
    ("column-level", ["Level", "Nivel", "Nível", "Уровень"]),
    ("column-endpoint", ["Endpoint", "Endpoint", "Endpoint", "Эндпоинт"]),
    ("column-message", ["Change", "Cambio", "Alteração", "Изменение"]),
    ("column-rule", ["Rule", "Regla", "Regra", "Правило"]),
    ("level-info", ["info", "información", "informação", "информация"]),
    ("level-warning", ["warning", "advertencia", "aviso", "предупреждение"]),
    ("level-error", ["error", "error", "erro", "ошибка"]),
    // Endpoint lifecycle
    ("api-path-added", ["api path added", "se agregó la ruta de la API", "caminho da API adicionado", "добавлен путь API"]),
    ("endpoint-added", ["endpoint added", "se agregó el endpoint", "endpoint adicionado", "добавлен эндпоинт"]),
    ("api-path-removed-without-deprecation", [
        "api path removed without deprecation",
        "se eliminó la ruta de la API sin deprecarla",
        "caminho da API removido sem descontinuação",
        "путь API удален без объявления устаревшим",
    ]),
    ("api-removed-without-deprecation", [
        "api removed without deprecation",
        "se eliminó la API sin deprecarla",
        "API removida sem descontinuação",
        "API удален без объявления устаревшим",
    ]),
    ("api-path-removed-before-sunset", [
        "api path removed before the sunset date {0}",
        "se eliminó la ruta de la API antes de la fecha de retiro {0}",
        "caminho da API removido antes da data de desativação {0}",
        "путь API удален до даты прекращения поддержки {0}",
    ]),
    ("api-removed-before-sunset", [
        "api removed before the sunset date {0}",
        "se eliminó la API antes de la fecha de retiro {0}",
        "API removida antes da data de desativação {0}",
        "API удален до даты прекращения поддержки {0}",
    ]),
    ("api-path-sunset-reached", [
        "api path removed after the sunset date {0}",
        "se eliminó la ruta de la API después de la fecha de retiro {0}",
        "caminho da API removido após a data de desativação {0}",
        "путь API удален после даты прекращения поддержки {0}",
    ]),
    ("api-removed-after-sunset", [
        "api removed after the sunset date {0}",
        "se eliminó la API después de la fecha de retiro {0}",
        "API removida após a data de desativação {0}",
        "API удален после даты прекращения поддержки {0}",
    ]),
    ("api-deprecated", [
        "endpoint deprecated with sunset date {0}",
        "endpoint deprecado con fecha de retiro {0}",
        "endpoint descontinuado com data de desativação {0}",
        "эндпоинт объявлен устаревшим, дата прекращения поддержки {0}",
    ]),
    ("api-reactivated", ["endpoint reactivated", "endpoint reactivado", "endpoint reativado", "эндпоинт снова активен"]),
    ("api-deprecated-sunset-missing", [
        "endpoint deprecated without a sunset date",
        "endpoint deprecado sin fecha de retiro",
        "endpoint descontinuado sem data de desativação",
        "эндпоинт объявлен устаревшим без даты прекращения поддержки",
    ]),
    ("api-sunset-date-too-small", [
        "sunset date {0} is earlier than the minimum {1}",
        "la fecha de retiro {0} es anterior al mínimo {1}",
        "a data de desativação {0} é anterior ao mínimo {1}",
        "дата прекращения поддержки {0} раньше минимальной {1}",
    ]),
    ("api-operation-id-updated", [
        "operation id changed from '{0}' to '{1}'",
        "el id de operación cambió de '{0}' a '{1}'",
        "o id da operação mudou de '{0}' para '{1}'",
        "идентификатор операции изменен с '{0}' на '{1}'",
    ]),
    // Request parameters
    ("new-required-request-parameter", [
        "added the new required '{0}' request parameter '{1}'",
        "se agregó el nuevo parámetro obligatorio '{1}' en '{0}'",
        "adicionado o novo parâmetro obrigatório '{1}' em '{0}'",
        "добавлен новый обязательный параметр запроса '{1}' в '{0}'",
    ]),
    ("new-optional-request-parameter", [
        "added the new optional '{0}' request parameter '{1}'",
        "se agregó el nuevo parámetro opcional '{1}' en '{0}'",
        "adicionado o novo parâmetro opcional '{1}' em '{0}'",
        "добавлен новый необязательный параметр запроса '{1}' в '{0}'",
    ]),
    ("request-parameter-removed", [
        "deleted the '{0}' request parameter '{1}'",
        "se eliminó el parámetro '{1}' en '{0}'",
        "removido o parâmetro '{1}' em '{0}'",
        "удален параметр запроса '{1}' в '{0}'",
    ]),
    ("request-parameter-became-required", [
        "the '{0}' request parameter '{1}' became required",
        "el parámetro '{1}' en '{0}' pasó a ser obligatorio",
        "o parâmetro '{1}' em '{0}' tornou-se obrigatório",
        "параметр запроса '{1}' в '{0}' стал обязательным",
    ]),
    ("request-parameter-became-optional", [
        "the '{0}' request parameter '{1}' became optional",
        "el parámetro '{1}' en '{0}' pasó a ser opcional",
        "o parâmetro '{1}' em '{0}' tornou-se opcional",
        "параметр запроса '{1}' в '{0}' стал необязательным",
    ]),
    ("request-parameter-type-changed", [
        "the '{0}' request parameter '{1}' type changed from '{2}' to '{3}'",
        "el tipo del parámetro '{1}' en '{0}' cambió de '{2}' a '{3}'",
        "o tipo do parâmetro '{1}' em '{0}' mudou de '{2}' para '{3}'",
        "тип параметра запроса '{1}' в '{0}' изменен с '{2}' на '{3}'",
    ]),
    ("request-parameter-enum-value-removed", [
        "removed the enum value '{2}' from the '{0}' request parameter '{1}'",
        "se eliminó el valor '{2}' del enum del parámetro '{1}' en '{0}'",
        "removido o valor '{2}' do enum do parâmetro '{1}' em '{0}'",
        "удалено значение '{2}' из перечисления параметра '{1}' в '{0}'",
    ]),
    // Request body
    ("request-body-added-required", [
        "added a required request body",
        "se agregó un cuerpo de solicitud obligatorio",
        "adicionado um corpo de requisição obrigatório",
        "добавлено обязательное тело запроса",
    ]),
    ("request-body-added-optional", [
        "added an optional request body",
        "se agregó un cuerpo de solicitud opcional",
        "adicionado um corpo de requisição opcional",
        "добавлено необязательное тело запроса",
    ]),
    ("request-body-removed", [
        "removed the request body",
        "se eliminó el cuerpo de la solicitud",
        "removido o corpo da requisição",
        "удалено тело запроса",
    ]),
    ("request-body-became-required", [
        "the request body became required",
        "el cuerpo de la solicitud pasó a ser obligatorio",
        "o corpo da requisição tornou-se obrigatório",
        "тело запроса стало обязательным",
    ]),
    ("request-body-became-optional", [
        "the request body became optional",
        "el cuerpo de la solicitud pasó a ser opcional",
        "o corpo da requisição tornou-se opcional",
        "тело запроса стало необязательным",
    ]),
    ("request-body-media-type-added", [
        "added the media type '{0}' to the request body",
        "se agregó el tipo de medio '{0}' al cuerpo de la solicitud",
        "adicionado o tipo de mídia '{0}' ao corpo da requisição",
        "в тело запроса добавлен тип содержимого '{0}'",
    ]),
    ("request-body-media-type-removed", [
        "removed the media type '{0}' from the request body",
        "se eliminó el tipo de medio '{0}' del cuerpo de la solicitud",
        "removido o tipo de mídia '{0}' do corpo da requisição",
        "из тела запроса удален тип содержимого '{0}'",
    ]),
    // Request properties
    ("new-required-request-property", [
        "added the new required request property '{0}'",
        "se agregó la nueva propiedad obligatoria '{0}' en la solicitud",
        "adicionada a nova propriedade obrigatória '{0}' na requisição",
        "добавлено новое обязательное свойство запроса '{0}'",
    ]),
    ("new-optional-request-property", [
        "added the new optional request property '{0}'",
        "se agregó la nueva propiedad opcional '{0}' en la solicitud",
        "adicionada a nova propriedade opcional '{0}' na requisição",
        "добавлено новое необязательное свойство запроса '{0}'",
    ]),
    ("request-property-removed", [
        "removed the request property '{0}'",
        "se eliminó la propiedad '{0}' de la solicitud",
        "removida a propriedade '{0}' da requisição",
        "удалено свойство запроса '{0}'",
    ]),
    ("request-property-became-required", [
        "the request property '{0}' became required",
        "la propiedad '{0}' de la solicitud pasó a ser obligatoria",
        "a propriedade '{0}' da requisição tornou-se obrigatória",
        "свойство запроса '{0}' стало обязательным",
    ]),
    ("request-property-became-optional", [
        "the request property '{0}' became optional",
        "la propiedad '{0}' de la solicitud pasó a ser opcional",
        "a propriedade '{0}' da requisição tornou-se opcional",
        "свойство запроса '{0}' стало необязательным",
    ]),
    ("request-property-type-changed", [
        "the request property '{0}' type changed from '{1}' to '{2}'",
        "el tipo de la propiedad '{0}' de la solicitud cambió de '{1}' a '{2}'",
        "o tipo da propriedade '{0}' da requisição mudou de '{1}' para '{2}'",
        "тип свойства запроса '{0}' изменен с '{1}' на '{2}'",
    ]),
    ("request-property-enum-value-removed", [
        "removed the enum value '{1}' from the request property '{0}'",
        "se eliminó el valor '{1}' del enum de la propiedad '{0}' de la solicitud",
        "removido o valor '{1}' do enum da propriedade '{0}' da requisição",
        "удалено значение '{1}' из перечисления свойства запроса '{0}'",
    ]),
    ("request-property-enum-value-added", [
        "added the enum value '{1}' to the request property '{0}'",
        "se agregó el valor '{1}' al enum de la propiedad '{0}' de la solicitud",
        "adicionado o valor '{1}' ao enum da propriedade '{0}' da requisição",
        "добавлено значение '{1}' в перечисление свойства запроса '{0}'",
    ]),
    // Responses
    ("response-success-status-added", [
        "added the success response status '{0}'",
        "se agregó el estado de respuesta exitosa '{0}'",
        "adicionado o status de resposta de sucesso '{0}'",
        "добавлен успешный статус ответа '{0}'",
    ]),
    ("response-success-status-removed", [
        "removed the success response status '{0}'",
        "se eliminó el estado de respuesta exitosa '{0}'",
        "removido o status de resposta de sucesso '{0}'",
        "удален успешный статус ответа '{0}'",
    ]),
    ("response-non-success-status-removed", [
        "removed the non-success response status '{0}'",
        "se eliminó el estado de respuesta no exitosa '{0}'",
        "removido o status de resposta sem sucesso '{0}'",
        "удален неуспешный статус ответа '{0}'",
    ]),
    ("response-media-type-added", [
        "added the media type '{0}' for the response status '{1}'",
        "se agregó el tipo de medio '{0}' para el estado de respuesta '{1}'",
        "adicionado o tipo de mídia '{0}' para o status de resposta '{1}'",
        "для статуса ответа '{1}' добавлен тип содержимого '{0}'",
    ]),
    ("response-media-type-removed", [
        "removed the media type '{0}' for the response status '{1}'",
        "se eliminó el tipo de medio '{0}' para el estado de respuesta '{1}'",
        "removido o tipo de mídia '{0}' para o status de resposta '{1}'",
        "для статуса ответа '{1}' удален тип содержимого '{0}'",
    ]),
    ("response-required-property-removed", [
        "removed the required property '{0}' from the response with the '{1}' status",
        "se eliminó la propiedad obligatoria '{0}' de la respuesta con estado '{1}'",
        "removida a propriedade obrigatória '{0}' da resposta com status '{1}'",
        "из ответа со статусом '{1}' удалено обязательное свойство '{0}'",
    ]),
    ("response-optional-property-removed", [
        "removed the optional property '{0}' from the response with the '{1}' status",
        "se eliminó la propiedad opcional '{0}' de la respuesta con estado '{1}'",
        "removida a propriedade opcional '{0}' da resposta com status '{1}'",
        "из ответа со статусом '{1}' удалено необязательное свойство '{0}'",
    ]),
    ("response-property-added", [
        "added the property '{0}' to the response with the '{1}' status",
        "se agregó la propiedad '{0}' a la respuesta con estado '{1}'",
        "adicionada a propriedade '{0}' à resposta com status '{1}'",
        "в ответ со статусом '{1}' добавлено свойство '{0}'",
    ]),
    ("response-property-became-optional", [
        "the response property '{0}' became optional for the status '{1}'",
        "la propiedad '{0}' de la respuesta pasó a ser opcional para el estado '{1}'",
        "a propriedade '{0}' da resposta tornou-se opcional para o status '{1}'",
        "свойство ответа '{0}' стало необязательным для статуса '{1}'",
    ]),
    ("response-property-became-required", [
        "the response property '{0}' became required for the status '{1}'",
        "la propiedad '{0}' de la respuesta pasó a ser obligatoria para el estado '{1}'",
        "a propriedade '{0}' da resposta tornou-se obrigatória para o status '{1}'",
        "свойство ответа '{0}' стало обязательным для статуса '{1}'",
    ]),
    ("response-property-type-changed", [
        "the response property '{0}' type changed from '{1}' to '{2}' for the status '{3}'",
        "el tipo de la propiedad '{0}' de la respuesta cambió de '{1}' a '{2}' para el estado '{3}'",
        "o tipo da propriedade '{0}' da resposta mudou de '{1}' para '{2}' para o status '{3}'",
        "тип свойства ответа '{0}' изменен с '{1}' на '{2}' для статуса '{3}'",
    ]),
    ("response-property-enum-value-added", [
        "added the enum value '{1}' to the response property '{0}' for the status '{2}'",
        "se agregó el valor '{1}' al enum de la propiedad '{0}' de la respuesta para el estado '{2}'",
        "adicionado o valor '{1}' ao enum da propriedade '{0}' da resposta para o status '{2}'",
        "добавлено значение '{1}' в перечисление свойства ответа '{0}' для статуса '{2}'",
    ]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::RULES;

    #[test]
    fn negotiates_first_supported_language() {
        assert_eq!(negotiate_language(Some("ru")), "ru");
        assert_eq!(negotiate_language(Some("fr-FR, es-MX;q=0.8, en;q=0.5")), "es");
        assert_eq!(negotiate_language(Some("pt-PT")), "pt-br");
        assert_eq!(negotiate_language(Some("PT-br")), "pt-br");
        assert_eq!(negotiate_language(Some("en-ZA")), "en");
    }

    #[test]
    fn unrecognized_or_absent_language_is_english() {
        assert_eq!(negotiate_language(None), "en");
        assert_eq!(negotiate_language(Some("")), "en");
        assert_eq!(negotiate_language(Some("fr, de;q=0.9")), "en");
        assert_eq!(negotiate_language(Some("*")), "en");
    }

    #[test]
    fn message_substitutes_arguments() {
        let localizer = Localizer::new("en");
        assert_eq!(
            localizer.message("request-parameter-removed", &["query", "limit"]),
            "deleted the 'query' request parameter 'limit'"
        );
    }

    #[test]
    fn message_does_not_expand_placeholders_inside_arguments() {
        let localizer = Localizer::new("en");
        assert_eq!(
            localizer.message("request-parameter-removed", &["path", "{1}"]),
            "deleted the 'path' request parameter '{1}'"
        );
        assert_eq!(
            localizer.message("in-api", &["GET", "/pets/{0}"]),
            "in API GET /pets/{0}"
        );
    }

    #[test]
    fn message_keeps_placeholders_without_arguments() {
        let localizer = Localizer::new("en");
        assert_eq!(localizer.message("in-api", &["GET"]), "in API GET {1}");
    }

    #[test]
    fn message_falls_back_to_key() {
        let localizer = Localizer::new("es");
        assert_eq!(localizer.message::<&str>("unknown-key", &[]), "unknown-key");
    }

    #[test]
    fn unsupported_localizer_language_uses_english() {
        let localizer = Localizer::new("fr");
        assert_eq!(localizer.language(), "en");
        assert_eq!(localizer.text("no-changes"), "No changes");
    }

    #[test]
    fn translations_differ_from_english() {
        assert_eq!(Localizer::new("es").text("no-changes"), "Sin cambios");
        assert_eq!(Localizer::new("ru").text("no-changes"), "Изменений нет");
        assert_eq!(Localizer::new("pt-br").text("title-changelog"), "Registro de alterações");
    }

    #[test]
    fn every_rule_has_a_complete_entry() {
        for rule in RULES {
            let entry = CATALOG.iter().find(|(key, _)| *key == rule.id);
            let Some((_, texts)) = entry else {
                panic!("no catalog entry for {}", rule.id);
            };
            for (lang, text) in SUPPORTED_LANGUAGES.iter().zip(texts) {
                assert!(!text.is_empty(), "{} missing for {}", rule.id, lang);
            }
        }
    }
}
