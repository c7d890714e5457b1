use crate::common::{MAX_UPLOAD_SIZE, TestApp, UploadFile, routes};

/// Number of stored blobs (staging directory excluded).
async fn blob_count(app: &TestApp) -> usize {
    let mut entries = tokio::fs::read_dir(app.blob_store.root()).await.unwrap();
    let mut n = 0;
    while let Some(entry) = entries.next_entry().await.unwrap() {
        if entry.file_type().await.unwrap().is_file() {
            n += 1;
        }
    }
    n
}

fn png(seed: u8, len: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend((0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)));
    bytes
}

mod upload {
    use super::*;

    #[tokio::test]
    async fn alice_photo_lifecycle() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload(UploadFile::new("photo.png", "image/png", vec![42u8; 500_000]), &token)
            .await;
        assert_eq!(res.status, 200, "upload failed: {}", res.text);
        let image = &res.body["image"];
        let id = image["id"].as_str().unwrap().to_string();
        assert_eq!(image["contentType"], "image/png");
        assert_eq!(image["originalName"], "photo.png");
        assert_eq!(image["sizeBytes"], 500_000);
        assert_eq!(image["favorite"], false);
        assert_eq!(image["archived"], false);
        assert!(image.get("storageKey").is_none());

        let res = app.put_with_token(&routes::favorite(&id), &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["isFavorite"], true);

        let res = app.delete_with_token(&routes::image(&id), &token).await;
        assert_eq!(res.status, 200);
        let res = app.get_with_token(&routes::image(&id), &token).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");

        let res = app.put_with_token(&routes::restore(&id), &token).await;
        assert_eq!(res.status, 200, "restore failed: {}", res.text);
        assert_eq!(res.body["image"]["trashed"], false);

        let res = app.get_with_token(&routes::image(&id), &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["favorite"], true);
    }

    #[tokio::test]
    async fn upload_requires_a_token() {
        let app = TestApp::spawn().await;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(png(1, 10)).file_name("a.png"),
        );
        let res = app
            .client
            .post(app.url(routes::UPLOAD))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 401);
    }

    #[tokio::test]
    async fn same_content_twice_is_a_duplicate() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;

        app.upload_png("a.png", &png(1, 64), &alice).await;
        let res = app
            .upload(UploadFile::new("copy.png", "image/png", png(1, 64)), &alice)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "DUPLICATE_UPLOAD");

        // Another owner may store identical bytes.
        app.upload_png("a.png", &png(1, 64), &bob).await;
        assert_eq!(blob_count(&app).await, 2);
    }

    #[tokio::test]
    async fn disallowed_type_leaves_nothing_behind() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload(UploadFile::new("notes.txt", "text/plain", b"hello".to_vec()), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_FILE_TYPE");
        assert_eq!(blob_count(&app).await, 0);
        let stats = app.get_with_token(routes::STATS, &token).await;
        assert_eq!(stats.body["total"], 0);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let big = vec![0u8; MAX_UPLOAD_SIZE as usize + 1];
        let res = app
            .upload(UploadFile::new("big.png", "image/png", big), &token)
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "FILE_TOO_LARGE");
        assert_eq!(blob_count(&app).await, 0);
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload(UploadFile::new("empty.png", "image/png", Vec::new()), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new().text("note", "no file here");
        let res = app
            .client
            .post(app.url(routes::UPLOAD))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn batch_reports_each_file() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_many(
                vec![
                    UploadFile::new("one.png", "image/png", png(1, 32)),
                    UploadFile::new("two.txt", "text/plain", b"nope".to_vec()),
                    UploadFile::new("three.gif", "image/gif", png(3, 32)),
                ],
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "batch failed: {}", res.text);
        assert_eq!(res.body["successful"], 2);
        assert_eq!(res.body["failed"], 1);
        assert_eq!(res.body["errors"][0]["index"], 1);
        assert_eq!(res.body["errors"][0]["filename"], "two.txt");
        assert!(res.body["errors"][0]["error"].is_string());
        assert_eq!(res.body["results"][0]["index"], 0);
        assert_eq!(res.body["results"][0]["status"], "success");
        assert_eq!(res.body["results"][1]["index"], 2);
        assert_eq!(res.body["results"][1]["image"]["contentType"], "image/gif");
    }

    #[tokio::test]
    async fn batch_over_request_limit_still_reports() {
        let app = TestApp::spawn_with(|config| {
            config.storage.max_request_size = 100 * 1024;
        })
        .await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_many(
                vec![
                    UploadFile::new("one.png", "image/png", png(1, 60 * 1024)),
                    UploadFile::new("two.png", "image/png", png(2, 60 * 1024)),
                    UploadFile::new("three.png", "image/png", png(3, 10)),
                ],
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "batch failed: {}", res.text);
        assert_eq!(res.body["successful"], 1);
        assert_eq!(res.body["results"][0]["filename"], "one.png");
        let errors = res.body["errors"].as_array().unwrap();
        assert!(!errors.is_empty());
        assert_eq!(errors[0]["index"], 1);
        assert_eq!(blob_count(&app).await, 1);
    }
}

mod browse {
    use super::*;

    #[tokio::test]
    async fn list_is_paginated_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let first = app.upload_png("first.png", &png(1, 16), &token).await;
        app.upload_png("second.png", &png(2, 16), &token).await;
        let third = app.upload_png("third.png", &png(3, 16), &token).await;

        let res = app
            .get_with_token(&format!("{}?page=1&size=2", routes::IMAGES), &token)
            .await;
        assert_eq!(res.status, 200, "list failed: {}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], third.as_str());
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["totalPages"], 2);

        let res = app
            .get_with_token(&format!("{}?page=2&size=2", routes::IMAGES), &token)
            .await;
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], first.as_str());
    }

    #[tokio::test]
    async fn list_honors_sort_parameters() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        app.upload_png("b.png", &png(1, 16), &token).await;
        app.upload_png("a.png", &png(2, 16), &token).await;

        let res = app
            .get_with_token(
                &format!("{}?sortBy=originalName&sortDir=asc", routes::IMAGES),
                &token,
            )
            .await;
        assert_eq!(res.body["data"][0]["originalName"], "a.png");

        let res = app
            .get_with_token(&format!("{}?sortBy=storageKey", routes::IMAGES), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unreachable_page_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        app.upload_png("a.png", &png(1, 16), &token).await;

        let res = app
            .get_with_token(
                &format!("{}?page={}&size=100", routes::IMAGES, u64::MAX),
                &token,
            )
            .await;
        assert_eq!(res.status, 400, "huge page: {}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app
            .get_with_token(&format!("{}?page=1000000", routes::IMAGES), &token)
            .await;
        assert_eq!(res.status, 200);
        assert!(res.body["data"].as_array().unwrap().is_empty());
        assert_eq!(res.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn users_never_see_each_others_images() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        let alice_img = app.upload_png("a.png", &png(1, 16), &alice).await;
        app.upload_png("b.png", &png(2, 16), &bob).await;

        let res = app.get_with_token(routes::IMAGES, &alice).await;
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], alice_img.as_str());

        let res = app.get_with_token(routes::IMAGES, &bob).await;
        let data = res.body["data"].as_array().unwrap();
        assert!(data.iter().all(|img| img["id"] != alice_img.as_str()));

        for path in [
            routes::image(&alice_img),
            routes::download(&alice_img),
            routes::thumbnail(&alice_img),
        ] {
            let res = app.get_with_token(&path, &bob).await;
            assert_eq!(res.status, 404, "{path} leaked to another user");
        }
        let res = app.put_with_token(&routes::favorite(&alice_img), &bob).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn search_matches_filenames_case_insensitively() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        app.upload_png("Beach_Day.png", &png(1, 16), &token).await;
        app.upload_png("mountain.png", &png(2, 16), &token).await;

        let res = app
            .get_with_token(&format!("{}?query=beach", routes::SEARCH), &token)
            .await;
        assert_eq!(res.status, 200);
        let data = res.body.as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["originalName"], "Beach_Day.png");

        let res = app.get_with_token(routes::SEARCH, &token).await;
        assert_eq!(res.body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stats_and_filtered_lists_follow_flags() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let mut ids = Vec::new();
        for i in 0..4u8 {
            ids.push(app.upload_png(&format!("{i}.png"), &png(i, 16), &token).await);
        }

        app.put_with_token(&routes::favorite(&ids[0]), &token).await;
        app.put_with_token(&routes::favorite(&ids[1]), &token).await;
        let res = app.put_with_token(&routes::archive(&ids[2]), &token).await;
        assert_eq!(res.body["isArchived"], true);

        let stats = app.get_with_token(routes::STATS, &token).await;
        assert_eq!(stats.body["total"], 3);
        assert_eq!(stats.body["favorites"], 2);
        assert_eq!(stats.body["archived"], 1);
        assert_eq!(stats.body["trash"], 0);

        app.delete_with_token(&routes::image(&ids[3]), &token).await;

        let favorites = app.get_with_token(routes::FAVORITES, &token).await;
        assert_eq!(favorites.body.as_array().unwrap().len(), 2);
        let archived = app.get_with_token(routes::ARCHIVED, &token).await;
        assert_eq!(archived.body[0]["id"], ids[2].as_str());
        let trash = app.get_with_token(routes::TRASH, &token).await;
        assert_eq!(trash.body.as_array().unwrap().len(), 1);
        assert_eq!(trash.body[0]["id"], ids[3].as_str());

        let stats = app.get_with_token(routes::STATS, &token).await;
        assert_eq!(stats.body["total"], 2);
        assert_eq!(stats.body["trash"], 1);
    }
}

mod content {
    use super::*;

    #[tokio::test]
    async fn download_streams_bytes_with_caching_headers() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let bytes = png(7, 4096);
        let id = app.upload_png("holiday.png", &bytes, &token).await;

        let res = app
            .client
            .get(app.url(&routes::download(&id)))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 200);
        let headers = res.headers().clone();
        assert_eq!(headers["content-type"], "image/png");
        assert!(
            headers["content-disposition"]
                .to_str()
                .unwrap()
                .starts_with("attachment;")
        );
        let etag = headers["etag"].to_str().unwrap().to_string();
        assert_eq!(res.bytes().await.unwrap().as_ref(), bytes.as_slice());

        let res = app
            .client
            .get(app.url(&routes::download(&id)))
            .header("Authorization", format!("Bearer {token}"))
            .header("If-None-Match", etag)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 304);
    }

    #[tokio::test]
    async fn thumbnail_serves_trashed_images_inline() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.upload_png("a.png", &png(1, 64), &token).await;
        app.delete_with_token(&routes::image(&id), &token).await;

        let res = app.get_with_token(&routes::download(&id), &token).await;
        assert_eq!(res.status, 404);

        let res = app
            .client
            .get(app.url(&routes::thumbnail(&id)))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 200);
        assert!(
            res.headers()["content-disposition"]
                .to_str()
                .unwrap()
                .starts_with("inline;")
        );
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn trashing_twice_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.upload_png("a.png", &png(1, 16), &token).await;

        let res = app.delete_with_token(&routes::image(&id), &token).await;
        assert_eq!(res.status, 200);
        let res = app.delete_with_token(&routes::image(&id), &token).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn restoring_an_active_image_conflicts() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.upload_png("a.png", &png(1, 16), &token).await;

        let res = app.put_with_token(&routes::restore(&id), &token).await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn foreign_restore_and_permanent_delete_conflict() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        let id = app.upload_png("a.png", &png(1, 16), &alice).await;
        app.delete_with_token(&routes::image(&id), &alice).await;

        let res = app.put_with_token(&routes::restore(&id), &bob).await;
        assert_eq!(res.status, 409);
        let res = app.delete_with_token(&routes::permanent(&id), &bob).await;
        assert_eq!(res.status, 409);
        assert_eq!(blob_count(&app).await, 1);
    }

    #[tokio::test]
    async fn permanent_delete_removes_row_and_file() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.upload_png("a.png", &png(1, 16), &token).await;
        assert_eq!(blob_count(&app).await, 1);

        let res = app.delete_with_token(&routes::permanent(&id), &token).await;
        assert_eq!(res.status, 200);
        assert!(res.body["message"].is_string());
        assert_eq!(blob_count(&app).await, 0);

        let res = app.get_with_token(&routes::thumbnail(&id), &token).await;
        assert_eq!(res.status, 404);
        let res = app.delete_with_token(&routes::permanent(&id), &token).await;
        assert_eq!(res.status, 404);

        // Same bytes may be uploaded again once the original is gone.
        app.upload_png("a.png", &png(1, 16), &token).await;
    }
}
