use crate::config::Config;
use crate::render;
use crate::state::Event;
use crate::store::Store;
use crate::types::{Origin, Upload};
use bytes::Buf;
use failure::Error;
use futures::{pin_mut, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::Sender;
use warp::http::Uri;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

#[derive(Debug)]
struct UploadRejected;

impl warp::reject::Reject for UploadRejected {}

#[derive(Deserialize)]
struct SearchForm {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
struct PreviewForm {
    url: String,
}

pub async fn run(store: Store, tx: Sender<Upload>, config: Config) {
    let routes = routes(store, tx, config.max_upload_bytes).with(warp::log("violation_board"));
    info!("Serving dashboard on port {}", config.port);
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;
}

pub fn routes(
    store: Store,
    tx: Sender<Upload>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_store = warp::any().map(move || store.clone());

    let index = warp::path::end()
        .and(warp::get())
        .and(with_store.clone())
        .and_then(|store: Store| async move {
            Ok::<_, Rejection>(warp::reply::html(store.read(render::page).await))
        });

    let violations = warp::path!("api" / "violations")
        .and(warp::get())
        .and(with_store.clone())
        .and_then(|store: Store| async move {
            let body = store
                .read(|state| {
                    json!({
                        "loading": state.loading,
                        "error": state.error,
                        "uploading": state.uploading,
                        "pendingUploads": state.pending_uploads,
                        "emptyResponse": state.empty_response,
                        "search": state.search,
                        "violations": state.filtered(),
                    })
                })
                .await;
            Ok::<_, Rejection>(warp::reply::json(&body))
        });

    let upload = warp::path!("upload")
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(warp::any().map(move || tx.clone()))
        .and(with_store.clone())
        .and_then(|form: FormData, tx: Sender<Upload>, store: Store| async move {
            let result = handle_upload(form, tx, store).await;
            if let Err(e) = &result {
                error!("Error handling upload: {:?}", e);
            }
            result.map_err(|_| warp::reject::custom(UploadRejected))
        });

    let search = warp::path!("search")
        .and(warp::post())
        .and(warp::body::form())
        .and(with_store.clone())
        .and_then(|form: SearchForm, store: Store| {
            dispatch(store, Event::SearchChanged(form.q))
        });

    let preview = warp::path!("preview")
        .and(warp::post())
        .and(warp::body::form())
        .and(with_store.clone())
        .and_then(|form: PreviewForm, store: Store| {
            dispatch(store, Event::MediaSelected(form.url))
        });

    let close_preview = warp::path!("preview" / "close")
        .and(warp::post())
        .and(with_store.clone())
        .and_then(|store: Store| dispatch(store, Event::MediaDismissed));

    let dismiss_error = warp::path!("error" / "dismiss")
        .and(warp::post())
        .and(with_store)
        .and_then(|store: Store| dispatch(store, Event::ErrorDismissed));

    index
        .or(violations)
        .or(upload)
        .or(search)
        .or(preview)
        .or(close_preview)
        .or(dismiss_error)
}

async fn dispatch(store: Store, event: Event) -> Result<impl Reply, Rejection> {
    store.dispatch(event).await;
    Ok(back_to_board())
}

fn back_to_board() -> impl Reply {
    warp::redirect::see_other(Uri::from_static("/"))
}

/// Reads the picker/drop form and queues the file. A form without a file
/// (nothing chosen) queues nothing. The upload counts as pending until the
/// ingest worker settles it.
async fn handle_upload(
    form: FormData,
    tx: Sender<Upload>,
    store: Store,
) -> Result<impl Reply, Error> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut origin = Origin::Picker;

    pin_mut!(form);
    while let Some(part) = form.next().await {
        let part = part?;
        let name = part.name().to_string();
        debug!("Got part {}", name);
        match name.as_str() {
            "file" => {
                let file_name = part.filename().unwrap_or_default().to_string();
                let content_type = part.content_type().map(str::to_string);
                let data = read_part(part).await?;
                if !file_name.is_empty() {
                    file = Some((file_name, content_type, data));
                }
            }
            "origin" => {
                origin = match read_part(part).await?.as_slice() {
                    b"drop" => Origin::Drop,
                    _ => Origin::Picker,
                };
            }
            _ => warn!("Ignoring part {}", name),
        }
    }

    match file {
        Some((file_name, content_type, data)) => {
            let upload = Upload::new(origin, &file_name, content_type.as_deref(), data);
            info!("Queueing upload {} {:?}", upload.id.to_simple(), file_name);
            store.dispatch(Event::UploadQueued).await;
            if tx.send(upload).await.is_err() {
                store.dispatch(Event::UploadSettled).await;
                return Err(format_err!("Upload queue closed"));
            }
        }
        None => info!("Upload form carried no file"),
    }
    Ok(back_to_board())
}

async fn read_part(part: Part) -> Result<Vec<u8>, Error> {
    let mut data: Vec<u8> = vec![];
    let stream = part.stream();
    pin_mut!(stream);
    while let Some(buf) = stream.next().await {
        data.extend_from_slice(buf?.chunk());
    }
    Ok(data)
}
