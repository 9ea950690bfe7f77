use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{api::Fields, transport::Request, Error, Transport};

use super::Client;

const PATH: &str = "/api/gemini/sugerir-resposta";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub source: Source,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    /// Written by the suggestion service.
    Remote,

    /// Canned reply, used whenever the service fails.
    Template,
}

#[derive(Serialize)]
struct Body<'a> {
    titulo: &'a str,
    descricao: &'a str,
}

impl<T: Transport> Client<T> {
    /// Drafts a reply for a ticket. Never fails: any problem with the
    /// suggestion service yields a templated reply instead.
    pub async fn suggest_reply(
        &self,
        title: &str,
        description: &str,
    ) -> Suggestion {
        match self.fetch_suggestion(title, description).await {
            Ok(text) => Suggestion {
                text,
                source: Source::Remote,
            },
            Err(e) => {
                warn!(error = %e, "suggestion service failed, using template");
                Suggestion {
                    text: template(title, description),
                    source: Source::Template,
                }
            }
        }
    }

    async fn fetch_suggestion(
        &self,
        title: &str,
        description: &str,
    ) -> Result<String, Error> {
        let body = Body {
            titulo: title,
            descricao: description,
        };
        let request = Request::post(PATH, json!(body))
            .anonymous()
            .timeout(self.suggestion_timeout);
        let answer = self.transport.send(request).await?;
        let text = Fields::of(&answer)?
            .str(&["sugestao", "Sugestao", "suggestion"])
            .map(|s| s.trim().to_owned())
            .ok_or_else(|| Error::Malformed("empty suggestion".into()))?;
        debug!(chars = text.len(), "suggestion received");
        Ok(text)
    }
}

/// Canned reply picked by keywords in the ticket text.
fn template(title: &str, description: &str) -> String {
    const TOPICS: &[(&[&str], &str)] = &[
        (
            &["printer", "impressora", "toner", "paper", "papel"],
            "Please check that the printer is powered on, has paper and \
             toner, and shows no error on its panel. Turning it off and on \
             again clears most jams. If the problem persists we will send a \
             technician.",
        ),
        (
            &["network", "rede", "internet", "wifi", "wi-fi", "vpn"],
            "Please confirm the network cable is plugged in (or that you are \
             on the corporate Wi-Fi) and restart your computer. If other \
             colleagues are affected too, let us know so we can check the \
             network equipment.",
        ),
        (
            &["password", "senha", "login", "access", "acesso"],
            "For security reasons passwords are reset by the support team. \
             We will contact you to confirm your identity and provide a \
             temporary password, which you must change at first login.",
        ),
    ];
    const GENERIC: &str = "We are analysing your request and will get back \
                           to you with a solution as soon as possible.";

    let text = format!("{title} {description}").to_lowercase();
    let body = TOPICS
        .iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(*w)))
        .map_or(GENERIC, |&(_, reply)| reply);
    format!(
        "Hello,\n\nThank you for reporting \"{}\".\n\n{body}\n\n\
         Best regards,\nIT Support",
        title.trim(),
    )
}
