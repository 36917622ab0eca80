use log::{ debug, warn };

use crate::llm::chat::{ ContentPart, MessageContent, PromptMessage };
use crate::media::{ encode_data_uri, infer_media_type, is_data_uri, MediaError, MediaFetcher };

async fn inline_one(url: &str, fetcher: &dyn MediaFetcher) -> Result<String, MediaError> {
    let bytes = fetcher.fetch(url).await?;
    if bytes.is_empty() {
        return Err(MediaError::Fetch(format!("empty body from {}", url)));
    }
    Ok(encode_data_uri(&bytes, infer_media_type(url)))
}

fn text_remainder(parts: Vec<ContentPart>) -> MessageContent {
    let text = parts
        .into_iter()
        .filter_map(|p| {
            match p {
                ContentPart::Text { text } => Some(text),
                ContentPart::ImageUrl { .. } => None,
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    MessageContent::Text(text)
}

/// Replaces every remote image reference with an inline `data:` URI.
///
/// Fetches run sequentially. An image that cannot be fetched is dropped and
/// its turn keeps only its text; the request itself never fails here.
/// Returns the number of images that were dropped.
pub async fn inline_images(messages: &mut [PromptMessage], fetcher: &dyn MediaFetcher) -> usize {
    let mut dropped = 0;

    for message in messages.iter_mut() {
        let MessageContent::Multipart(parts) = &mut message.content else {
            continue;
        };

        let mut kept = Vec::with_capacity(parts.len());
        for part in parts.drain(..) {
            match part {
                ContentPart::ImageUrl { image_url } if !is_data_uri(&image_url.url) => {
                    match inline_one(&image_url.url, fetcher).await {
                        Ok(data_uri) => {
                            debug!("Inlined image {} ({} bytes encoded)", image_url.url, data_uri.len());
                            kept.push(ContentPart::image(data_uri));
                        }
                        Err(e) => {
                            warn!("Dropping image {} from vision request: {}", image_url.url, e);
                            dropped += 1;
                        }
                    }
                }
                other => kept.push(other),
            }
        }

        message.content = if kept.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })) {
            MessageContent::Multipart(kept)
        } else {
            text_remainder(kept)
        };
    }

    dropped
}
