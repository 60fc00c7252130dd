use crate::common::{TestApp, routes};

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

mod file_upload {
    use super::*;

    #[tokio::test]
    async fn upload_returns_reference_and_stores_bytes() {
        let app = TestApp::spawn().await;

        let res = app.upload("Hello.TXT", b"hello".to_vec(), "text/plain").await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert!(res.body["id"].as_i64().is_some());
        assert_eq!(res.body["original_filename"], "Hello.TXT");
        assert_eq!(res.body["file_type"], "text/plain");
        assert_eq!(res.body["size"], 5);
        assert_eq!(res.body["content_hash"], HELLO_SHA256);
        assert!(res.body["uploaded_at"].as_str().is_some());

        let location = res.body["file"].as_str().unwrap();
        assert_eq!(
            location,
            format!("uploads/2cf2/4dba/{HELLO_SHA256}.txt")
        );
        assert_eq!(std::fs::read(app.stored_path(location)).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn identical_content_is_stored_once() {
        let app = TestApp::spawn().await;

        let first = app.upload("one.txt", b"same".to_vec(), "text/plain").await;
        let second = app.upload("two.txt", b"same".to_vec(), "text/plain").await;

        assert_eq!(first.status, 201);
        assert_eq!(second.status, 201);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.body["file"], second.body["file"]);
        assert_eq!(second.body["original_filename"], "two.txt");

        let stats = app.get(routes::STORAGE_STATS).await;
        assert_eq!(stats.body["total_files"], 1);
        assert_eq!(stats.body["total_references"], 2);
        assert_eq!(stats.body["total_size"], 4);
        assert_eq!(stats.body["total_space_saved"], 4);
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let form = reqwest::multipart::Form::new().text("note", "no file here");

        let res = app
            .client
            .post(app.url(routes::FILES))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 400);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.upload("empty.txt", Vec::new(), "text/plain").await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_with_readable_sizes() {
        let app = TestApp::spawn_with_max_upload(1024).await;

        let res = app
            .upload("big.bin", vec![1u8; 2048], "application/octet-stream")
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(
            res.body["message"],
            "Maximum file size allowed is 1.00 KB. Your file is 2.00 KB"
        );

        let stats = app.get(routes::STORAGE_STATS).await;
        assert_eq!(stats.body["total_references"], 0);
        assert!(!app.media_root().join("uploads").exists());
    }

    #[tokio::test]
    async fn upload_at_the_limit_is_accepted() {
        let app = TestApp::spawn_with_max_upload(1024).await;

        let res = app
            .upload("exact.bin", vec![9u8; 1024], "application/octet-stream")
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["size"], 1024);
    }
}

mod file_list {
    use super::*;

    async fn seeded() -> TestApp {
        let app = TestApp::spawn().await;
        app.upload_ok("Alpha.txt", b"aaa", "text/plain").await;
        app.upload_ok("beta.png", b"bbbbbbb", "image/png").await;
        app.upload_ok("gamma.txt", b"ccccc", "text/plain").await;
        app
    }

    #[tokio::test]
    async fn default_listing_is_newest_first_with_pagination() {
        let app = seeded().await;

        let res = app.get(routes::FILES).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.filenames(), ["gamma.txt", "beta.png", "Alpha.txt"]);
        assert_eq!(res.body["pagination"]["page"], 1);
        assert_eq!(res.body["pagination"]["page_size"], 10);
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["total_pages"], 1);
    }

    #[tokio::test]
    async fn page_size_splits_results() {
        let app = seeded().await;

        let res = app
            .get(&format!("{}?page=2&page_size=2", routes::FILES))
            .await;

        assert_eq!(res.filenames(), ["Alpha.txt"]);
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["total_pages"], 2);
    }

    #[tokio::test]
    async fn ordering_by_size_and_filename() {
        let app = seeded().await;

        let by_size = app.get(&format!("{}?ordering=size", routes::FILES)).await;
        let by_name_desc = app
            .get(&format!("{}?ordering=-original_filename", routes::FILES))
            .await;

        assert_eq!(by_size.filenames(), ["Alpha.txt", "gamma.txt", "beta.png"]);
        assert_eq!(
            by_name_desc.filenames(),
            ["gamma.txt", "beta.png", "Alpha.txt"]
        );
    }

    #[tokio::test]
    async fn filters_combine() {
        let app = seeded().await;

        let by_name = app.get(&format!("{}?filename=ALPHA", routes::FILES)).await;
        assert_eq!(by_name.filenames(), ["Alpha.txt"]);

        let by_type = app
            .get(&format!(
                "{}?file_type=image/png,application/pdf",
                routes::FILES
            ))
            .await;
        assert_eq!(by_type.filenames(), ["beta.png"]);

        let by_size = app
            .get(&format!(
                "{}?min_size=4&max_size=6&file_type=text/plain",
                routes::FILES
            ))
            .await;
        assert_eq!(by_size.filenames(), ["gamma.txt"]);
    }

    #[tokio::test]
    async fn placeholder_numbers_are_ignored() {
        let app = seeded().await;

        let res = app
            .get(&format!(
                "{}?min_size=null&max_size=undefined&date_after_epoch=",
                routes::FILES
            ))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["pagination"]["total"], 3);
    }

    #[tokio::test]
    async fn malformed_number_is_rejected() {
        let app = seeded().await;

        let res = app.get(&format!("{}?min_size=lots", routes::FILES)).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn date_filters_take_unix_milliseconds() {
        let app = seeded().await;
        let tomorrow = chrono::Utc::now().timestamp_millis() + 86_400_000;

        let after = app
            .get(&format!("{}?date_after_epoch={tomorrow}", routes::FILES))
            .await;
        let before = app
            .get(&format!("{}?date_before_epoch={tomorrow}", routes::FILES))
            .await;

        assert_eq!(after.body["pagination"]["total"], 0);
        assert_eq!(before.body["pagination"]["total"], 3);
    }

    #[tokio::test]
    async fn out_of_range_date_is_rejected() {
        let app = seeded().await;

        let res = app
            .get(&format!(
                "{}?date_after_epoch=-9223372036854775808",
                routes::FILES
            ))
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn file_types_are_distinct_and_sorted() {
        let app = seeded().await;

        let res = app.get(routes::FILE_TYPES).await;

        assert_eq!(res.status, 200);
        assert_eq!(
            res.body["file_types"],
            serde_json::json!(["image/png", "text/plain"])
        );
    }
}

mod file_download {
    use super::*;

    #[tokio::test]
    async fn get_returns_metadata() {
        let app = TestApp::spawn().await;
        let id = app.upload_ok("hello.txt", b"hello", "text/plain").await;

        let res = app.get(&routes::file(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.id(), id);
        assert_eq!(res.body["content_hash"], HELLO_SHA256);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::file(999)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn content_streams_bytes_with_etag() {
        let app = TestApp::spawn().await;
        let id = app.upload_ok("hello.txt", b"hello", "text/plain").await;

        let res = app
            .client
            .get(app.url(&routes::file_content(id)))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "text/plain");
        assert_eq!(
            res.headers()["etag"].to_str().unwrap(),
            format!("\"{HELLO_SHA256}\"")
        );
        assert!(
            res.headers()["content-disposition"]
                .to_str()
                .unwrap()
                .contains("hello.txt")
        );
        assert_eq!(res.bytes().await.unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let app = TestApp::spawn().await;
        let id = app.upload_ok("hello.txt", b"hello", "text/plain").await;

        let res = app
            .client
            .get(app.url(&routes::file_content(id)))
            .header("If-None-Match", format!("\"{HELLO_SHA256}\""))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 304);
    }
}

mod file_delete {
    use super::*;

    #[tokio::test]
    async fn shared_content_survives_until_last_delete() {
        let app = TestApp::spawn().await;
        let a = app.upload("a.txt", b"hello".to_vec(), "text/plain").await;
        let b = app.upload("b.txt", b"hello".to_vec(), "text/plain").await;
        let stored = app.stored_path(a.body["file"].as_str().unwrap());

        let res = app.delete(&routes::file(a.id())).await;
        assert_eq!(res.status, 204);
        assert!(stored.exists());
        assert_eq!(app.get(&routes::file(a.id())).await.status, 404);
        assert_eq!(app.get(&routes::file(b.id())).await.status, 200);

        let res = app.delete(&routes::file(b.id())).await;
        assert_eq!(res.status, 204);
        assert!(!stored.exists());
        assert!(!app.media_root().join("uploads").exists());
        assert!(app.media_root().exists());

        let stats = app.get(routes::STORAGE_STATS).await;
        assert_eq!(stats.body["total_files"], 0);
        assert_eq!(stats.body["total_references"], 0);
        assert_eq!(stats.body["total_size_readable"], "0.00 B");
    }

    #[tokio::test]
    async fn deleting_unknown_file_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.delete(&routes::file(12345)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let app = TestApp::spawn().await;
        let id = app.upload_ok("once.txt", b"once", "text/plain").await;

        assert_eq!(app.delete(&routes::file(id)).await.status, 204);
        assert_eq!(app.delete(&routes::file(id)).await.status, 404);
    }

    #[tokio::test]
    async fn file_types_drop_unreferenced_content() {
        let app = TestApp::spawn().await;
        let png = app.upload_ok("pic.png", b"\x89PNG", "image/png").await;
        app.upload_ok("note.txt", b"note", "text/plain").await;

        app.delete(&routes::file(png)).await;
        let res = app.get(routes::FILE_TYPES).await;

        assert_eq!(res.body["file_types"], serde_json::json!(["text/plain"]));
    }
}

mod storage_stats {
    use super::*;

    #[tokio::test]
    async fn stats_report_savings_in_bytes_and_readable_form() {
        let app = TestApp::spawn().await;
        let data = vec![5u8; 1536];
        for name in ["a.bin", "b.bin", "c.bin"] {
            app.upload_ok(name, &data, "application/octet-stream").await;
        }

        let res = app.get(routes::STORAGE_STATS).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total_files"], 1);
        assert_eq!(res.body["total_references"], 3);
        assert_eq!(res.body["total_size"], 1536);
        assert_eq!(res.body["total_space_saved"], 3072);
        assert_eq!(res.body["total_size_readable"], "1.50 KB");
        assert_eq!(res.body["total_space_saved_readable"], "3.00 KB");
    }
}
